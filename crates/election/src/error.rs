use snafu::Snafu;

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum ElectionError {
    #[snafu(display(
        "Insufficient reachable coordinators: required {required}, found {found}"
    ))]
    InsufficientCoordinators { required: usize, found: usize },
    #[snafu(display(
        "Insufficient nodes: {nb_authorized} authorized, {nb_reachable} reachable"
    ))]
    InsufficientNodes {
        nb_authorized: usize,
        nb_reachable: usize,
    },
    #[snafu(display(
        "Insufficient validators: required {required} reachable over {required_patches} patches, found {reachable} over {patches}"
    ))]
    InsufficientValidators {
        required: usize,
        required_patches: usize,
        reachable: usize,
        patches: usize,
    },
    #[snafu(display("No reachable storage nodes"))]
    NoStorageNodes,
}

pub type ElectionResult<T> = Result<T, ElectionError>;
