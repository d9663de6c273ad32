mod block_volume;
mod brick;
mod volume;

pub use block_volume::*;
pub use brick::*;
pub use volume::*;

use serde::{Deserialize, Serialize};

#[macro_export]
macro_rules! impl_string_id_inner {
    ($Name:ident, $Doc:literal) => {
        #[doc = $Doc]
        #[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $Name(String);

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl $Name {
            /// Get a reference to the inner string id.
            pub fn as_str<'a>(&'a self) -> &'a str {
                self.0.as_str()
            }
        }

        impl From<&str> for $Name {
            fn from(id: &str) -> Self {
                $Name::from(id)
            }
        }
        impl From<String> for $Name {
            fn from(id: String) -> Self {
                $Name::from(id.as_str())
            }
        }

        impl From<&$Name> for $Name {
            fn from(id: &$Name) -> $Name {
                id.clone()
            }
        }

        impl From<$Name> for String {
            fn from(id: $Name) -> String {
                id.to_string()
            }
        }
        impl From<&$Name> for String {
            fn from(id: &$Name) -> String {
                id.to_string()
            }
        }
    };
}

#[macro_export]
macro_rules! impl_string_id {
    ($Name:ident, $Doc:literal) => {
        impl_string_id_inner!($Name, $Doc);
        impl Default for $Name {
            /// Generates new blank identifier.
            fn default() -> Self {
                $Name(uuid::Uuid::default().simple().to_string())
            }
        }
        impl $Name {
            /// Build Self from a string trait id.
            pub fn from<T: Into<String>>(id: T) -> Self {
                $Name(id.into())
            }
            /// Generates new random identifier.
            pub fn new() -> Self {
                $Name(uuid::Uuid::new_v4().simple().to_string())
            }
        }
    };
}

impl_string_id!(ClusterId, "ID of a storage cluster");
impl_string_id!(NodeId, "ID of a storage node");
impl_string_id!(DeviceId, "ID of a raw block device on a node");
impl_string_id!(BrickId, "ID of a brick, the slice of a volume on one device");
impl_string_id!(VolumeId, "ID of a volume");
impl_string_id!(BlockVolumeId, "ID of a block volume, carved out of a hosting volume");
impl_string_id!(OperationId, "ID of a pending operation");

/// Host and path of a brick, as known by the remote system.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq, Default)]
pub struct BrickPath {
    /// Storage host serving the brick.
    pub host: String,
    /// Mount path of the brick on the host.
    pub path: String,
}
impl BrickPath {
    /// New `Self` from the given host and path.
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
        }
    }
}
impl std::fmt::Display for BrickPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.path)
    }
}
