use std::time::Duration;

use bincode::{Decode, Encode};
use time::UtcDateTime;
use uniledger_util_array_type::array_type_fixed_size_define;

array_type_fixed_size_define! {
    /// Microsecond-precision absolute timestamp, UTC
    #[derive(Encode, Decode, Clone, Copy, Hash)]
    pub struct Timestamp(u64);
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from(
            u64::try_from(UtcDateTime::now().unix_timestamp_nanos() / 1000).expect("Can't fail"),
        )
    }

    /// Convert to datetime, if in range
    pub fn to_datetime(self) -> Option<UtcDateTime> {
        UtcDateTime::from_unix_timestamp_nanos(i128::from(self.to_number()) * 1000).ok()
    }

    pub fn is_in_future(self) -> bool {
        Self::now() < self
    }

    pub fn checked_add_duration(self, duration: Duration) -> Option<Self> {
        self.checked_add(u64::try_from(duration.as_micros()).ok()?)
    }

    pub fn saturating_sub_duration(self, duration: Duration) -> Self {
        self.saturating_sub(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Timestamp;

    #[test]
    fn timestamp_ordering_follows_time() {
        let now = Timestamp::now();
        let later = now
            .checked_add_duration(Duration::from_secs(5))
            .expect("no overflow");
        let earlier = now.saturating_sub_duration(Duration::from_secs(5));

        assert!(earlier < now);
        assert!(now < later);
        assert!(later.is_in_future());
        assert!(!earlier.is_in_future());
        assert!(now.to_datetime().is_some());
    }
}
