/// Catalog row identifiers - newtype pattern for type safety
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

catalog_id!(
    /// Identifier of a logical sequencing sample
    ReadsetId
);
catalog_id!(
    /// Identifier of one physical file (pair) attached to a readset
    ReadDataId
);
catalog_id!(
    /// Identifier of a catalog-registered file
    DataFileId
);
catalog_id!(
    /// Identifier of the ingestion or analysis run that produced rows
    RunId
);
catalog_id!(ContainerId);
