use snafu::ResultExt as _;

use super::*;

#[test]
fn node_coordinates_stay_on_the_grid() {
    let patches: Vec<_> = (0..32)
        .map(|idx| {
            let (lat, lon) = node_coordinates(idx);
            compute_patch(lat, lon).expect("On the grid")
        })
        .collect();

    assert_ne!(patches[0], patches[1]);
}

#[test_log::test(tokio::test)]
async fn devnet_needs_a_reachable_node() {
    assert!(
        Devnet::builder()
            .num_nodes(2)
            .num_unreachable(2)
            .build()
            .await
            .is_err()
    );
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn devnet_mines_a_keychain() -> WhateverResult<()> {
    let devnet = Devnet::builder().num_nodes(4).build().await?;

    assert_eq!(devnet.run(3, 2).await?, 3);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn devnet_mines_with_a_node_cut_off() -> WhateverResult<()> {
    let devnet = Devnet::builder()
        .num_nodes(4)
        .num_unreachable(1)
        .build()
        .await?;

    assert_eq!(devnet.run(2, 1).await?, 2);
    Ok(())
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn devnet_persists_to_data_dir() -> WhateverResult<()> {
    let dir = tempfile::tempdir().whatever_context("Failed to create temp dir")?;
    let devnet = Devnet::builder()
        .num_nodes(3)
        .data_dir(dir.path().to_owned())
        .build()
        .await?;

    assert_eq!(devnet.run(2, 1).await?, 2);
    assert!(dir.path().join("node-0.redb").exists());
    Ok(())
}
