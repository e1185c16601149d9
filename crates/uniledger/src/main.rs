use uniledger::Uniledger;
use uniledger_util_error::WhateverResult;

#[tokio::main]
#[snafu::report]
async fn main() -> WhateverResult<()> {
    Uniledger::builder().run().await?;
    Ok(())
}
