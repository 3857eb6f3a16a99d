//! Exact decimal wrappers for order payloads.
//!
//! The scheduler never does arithmetic on prices or sizes. It carries them
//! from the caller to the signing collaborator, so the wrappers only pin the
//! meaning of a `Decimal` and keep its string wire form.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! decimal_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Decimal);

        impl $name {
            #[inline]
            pub fn new(value: Decimal) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

decimal_newtype!(
    /// Limit price.
    Price
);

decimal_newtype!(
    /// Order quantity.
    Size
);
