use bincode::config;

pub const LEDGER_LIMIT_16M: usize = 0x100_0000;

/// Encoding every hash and signature in the ledger commits to
///
/// Changing it changes every transaction hash, so it's fixed for good.
pub const LEDGER_BINCODE_CONFIG: config::Configuration<
    config::BigEndian,
    config::Varint,
    config::Limit<LEDGER_LIMIT_16M>,
> = config::standard()
    .with_limit::<LEDGER_LIMIT_16M>()
    .with_big_endian()
    .with_variable_int_encoding();
