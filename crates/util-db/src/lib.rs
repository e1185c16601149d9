// SPDX-License-Identifier: MIT

pub use ::redb_bincode;

/// Declare a typed `redb` table as a module
///
/// The module exposes `Key`, `Value`, `Table`, the table `NAME`
/// and its `TABLE` definition.
#[macro_export]
macro_rules! def_table {
    ($(#[$outer:meta])*
        $name:ident : $k:ty => $v:ty) => {
        #[allow(unused)]
        $(#[$outer])*
        pub mod $name {
            use super::*;
            pub type Key = $k;
            pub type Value = $v;
            pub type Definition<'a> = $crate::redb_bincode::TableDefinition<'a, Key, Value>;
            pub type Table<'a> = $crate::redb_bincode::Table<'a, Key, Value>;
            pub const NAME: &str = stringify!($name);
            pub const TABLE: Definition = $crate::redb_bincode::TableDefinition::new(NAME);
        }
    };
}
