use snafu::ensure;

use crate::error::{ElectionResult, InsufficientNodesSnafu};

/// Size of the coordinator pool
///
/// Small networks elect a single coordinator, larger ones elect five unless
/// few of the nodes are reachable.
pub fn required_coordinators(nb_authorized: usize, nb_reachable: usize) -> usize {
    if nb_authorized < 5 && 1 <= nb_reachable {
        1
    } else if 5 <= nb_authorized && nb_reachable <= 5 {
        1
    } else {
        5
    }
}

/// Number of validators a system transaction needs
pub fn required_validators_for_system_tx(
    nb_authorized: usize,
    nb_reachable: usize,
) -> ElectionResult<usize> {
    if nb_authorized <= 2 && nb_reachable == 1 {
        return Ok(1);
    }
    if nb_authorized <= 5 && 1 <= nb_reachable {
        return Ok(nb_reachable);
    }
    ensure!(
        5 < nb_authorized && 5 <= nb_reachable,
        InsufficientNodesSnafu {
            nb_authorized,
            nb_reachable,
        }
    );
    Ok(5)
}
