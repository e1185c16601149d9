/// Maps a transaction fee to the number of validators it pays for
pub trait FeeSchedule {
    /// An odd validator count, between [`MIN_VALIDATORS`] and
    /// [`MAX_VALIDATORS`]
    fn validators_for_fee(&self, fee: u64) -> usize;
}

pub const MIN_VALIDATORS: usize = 3;
pub const MAX_VALIDATORS: usize = 99;

/// Every `fee_step` of fee buys two more validators
#[derive(Debug, Clone, Copy)]
pub struct FeeMatrix {
    fee_step: u64,
}

impl FeeMatrix {
    pub const DEFAULT_FEE_STEP: u64 = 1_000;

    pub fn new(fee_step: u64) -> Self {
        Self {
            fee_step: fee_step.max(1),
        }
    }
}

impl Default for FeeMatrix {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FEE_STEP)
    }
}

impl FeeSchedule for FeeMatrix {
    fn validators_for_fee(&self, fee: u64) -> usize {
        let max_steps = (MAX_VALIDATORS - MIN_VALIDATORS) / 2;
        let steps = usize::try_from(fee / self.fee_step)
            .unwrap_or(usize::MAX)
            .min(max_steps);
        MIN_VALIDATORS + 2 * steps
    }
}
