//! Typed views of transactions, as persisted by the type-specific stores

use snafu::{OptionExt as _, Snafu, ensure};

use crate::transaction::{Transaction, TransactionType};

pub const FIELD_ENCRYPTED_ADDRESS_BY_NODE: &str = "encrypted_address_by_node";
pub const FIELD_ENCRYPTED_WALLET: &str = "encrypted_wallet";
pub const FIELD_ENCRYPTED_ADDRESS_BY_ID: &str = "encrypted_address_by_id";
pub const FIELD_ENCRYPTED_AES_KEY: &str = "encrypted_aes_key";

/// Data fields of a keychain transaction, in checking order
pub const KEYCHAIN_FIELDS: [&str; 2] = [FIELD_ENCRYPTED_ADDRESS_BY_NODE, FIELD_ENCRYPTED_WALLET];

/// Data fields of an id transaction, in checking order
pub const ID_FIELDS: [&str; 3] = [
    FIELD_ENCRYPTED_ADDRESS_BY_NODE,
    FIELD_ENCRYPTED_ADDRESS_BY_ID,
    FIELD_ENCRYPTED_AES_KEY,
];

/// Fields a transaction of `tx_type` must carry, if any
pub fn required_fields(tx_type: TransactionType) -> &'static [&'static str] {
    match tx_type {
        TransactionType::Keychain => &KEYCHAIN_FIELDS,
        TransactionType::Id => &ID_FIELDS,
        TransactionType::Contract | TransactionType::ContractMessage => &[],
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ProjectionError {
    #[snafu(display("Expected a {expected} transaction, got {actual}"))]
    WrongType {
        expected: TransactionType,
        actual: TransactionType,
    },
    #[snafu(display("Missing field {field}"))]
    MissingField { field: &'static str },
    #[snafu(display("Field {field} is not hexadecimal"))]
    NotHexadecimal { field: &'static str },
}

pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Check the type and decode the required fields, in order
fn decode_fields<const N: usize>(
    tx: &Transaction,
    expected: TransactionType,
    fields: [&'static str; N],
) -> ProjectionResult<[Vec<u8>; N]> {
    ensure!(
        tx.tx_type() == expected,
        WrongTypeSnafu {
            expected,
            actual: tx.tx_type(),
        }
    );

    let mut decoded: [Vec<u8>; N] = std::array::from_fn(|_| vec![]);
    for (field, out) in fields.into_iter().zip(decoded.iter_mut()) {
        let value = tx.content.data.get(field).context(MissingFieldSnafu { field })?;
        *out = data_encoding::HEXLOWER_PERMISSIVE
            .decode(value.as_bytes())
            .ok()
            .context(NotHexadecimalSnafu { field })?;
    }
    Ok(decoded)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keychain {
    pub transaction: Transaction,
    pub encrypted_address_by_node: Vec<u8>,
    pub encrypted_wallet: Vec<u8>,
}

impl TryFrom<Transaction> for Keychain {
    type Error = ProjectionError;

    fn try_from(transaction: Transaction) -> ProjectionResult<Self> {
        let [encrypted_address_by_node, encrypted_wallet] =
            decode_fields(&transaction, TransactionType::Keychain, KEYCHAIN_FIELDS)?;
        Ok(Self {
            transaction,
            encrypted_address_by_node,
            encrypted_wallet,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id {
    pub transaction: Transaction,
    pub encrypted_address_by_node: Vec<u8>,
    pub encrypted_address_by_id: Vec<u8>,
    pub encrypted_aes_key: Vec<u8>,
}

impl TryFrom<Transaction> for Id {
    type Error = ProjectionError;

    fn try_from(transaction: Transaction) -> ProjectionResult<Self> {
        let [
            encrypted_address_by_node,
            encrypted_address_by_id,
            encrypted_aes_key,
        ] = decode_fields(&transaction, TransactionType::Id, ID_FIELDS)?;
        Ok(Self {
            transaction,
            encrypted_address_by_node,
            encrypted_address_by_id,
            encrypted_aes_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Seckey;
    use crate::timestamp::Timestamp;
    use crate::transaction::TransactionContent;

    fn tx_with(tx_type: TransactionType, data: &[(&str, &str)]) -> Transaction {
        let seckey = Seckey::generate();
        let content = TransactionContent::builder()
            .address(rand::random())
            .tx_type(tx_type)
            .data(
                data.iter()
                    .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                    .collect(),
            )
            .timestamp(Timestamp::now())
            .public_key(seckey.pubkey())
            .build();
        Transaction::new_signed(content, seckey, Seckey::generate())
    }

    #[test]
    fn keychain_projection_decodes_fields() {
        let tx = tx_with(
            TransactionType::Keychain,
            &[
                (FIELD_ENCRYPTED_ADDRESS_BY_NODE, "0a0b"),
                (FIELD_ENCRYPTED_WALLET, "FF"),
            ],
        );
        let keychain = Keychain::try_from(tx).expect("valid keychain");
        assert_eq!(keychain.encrypted_address_by_node, vec![0x0a, 0x0b]);
        assert_eq!(keychain.encrypted_wallet, vec![0xff]);
    }

    #[test]
    fn odd_length_field_is_not_hexadecimal() {
        let tx = tx_with(
            TransactionType::Keychain,
            &[
                (FIELD_ENCRYPTED_ADDRESS_BY_NODE, "0a0b"),
                (FIELD_ENCRYPTED_WALLET, "abc"),
            ],
        );
        assert_eq!(
            Keychain::try_from(tx),
            Err(ProjectionError::NotHexadecimal {
                field: FIELD_ENCRYPTED_WALLET
            })
        );
    }

    #[test]
    fn projection_rejects_wrong_type() {
        let tx = tx_with(TransactionType::Id, &[]);
        assert_eq!(
            Keychain::try_from(tx),
            Err(ProjectionError::WrongType {
                expected: TransactionType::Keychain,
                actual: TransactionType::Id,
            })
        );
    }

    #[test]
    fn projection_reports_first_bad_field_in_order() {
        let tx = tx_with(
            TransactionType::Id,
            &[
                (FIELD_ENCRYPTED_ADDRESS_BY_NODE, "not hex"),
                (FIELD_ENCRYPTED_AES_KEY, "00"),
            ],
        );
        assert_eq!(
            Id::try_from(tx),
            Err(ProjectionError::NotHexadecimal {
                field: FIELD_ENCRYPTED_ADDRESS_BY_NODE
            })
        );

        let tx = tx_with(
            TransactionType::Id,
            &[
                (FIELD_ENCRYPTED_ADDRESS_BY_NODE, "00"),
                (FIELD_ENCRYPTED_AES_KEY, "00"),
            ],
        );
        assert_eq!(
            Id::try_from(tx),
            Err(ProjectionError::MissingField {
                field: FIELD_ENCRYPTED_ADDRESS_BY_ID
            })
        );
    }
}
