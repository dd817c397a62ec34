use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Crockford base32 alphabet, no padding, lowercase to match the wire format
/// used throughout the API (`[A-Za-z0-9]{26}` per the endpoint contract).
const ALPHABET: &[u8] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Generates a fresh 26-character Crockford base32 identifier from 16 random
/// bytes (128 bits, like a UUID, just re-encoded to the wire alphabet this
/// system uses for every resource ID).
fn generate() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut bits = 0u128;
    for b in bytes {
        bits = (bits << 8) | b as u128;
    }
    // 16 bytes = 128 bits = 26 Crockford symbols (130 bits) with 2 bits slack.
    bits <<= 2;
    let mut out = String::with_capacity(26);
    for i in (0..26).rev() {
        let idx = ((bits >> (i * 5)) & 0x1f) as usize;
        out.push(ALPHABET[idx] as char);
    }
    out
}

macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(generate())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

id_type!(ClusterId);
id_type!(InstallationId);
id_type!(ClusterInstallationId);
id_type!(GroupId);
id_type!(MultitenantDatabaseId);
id_type!(LogicalDatabaseId);
id_type!(DatabaseSchemaId);
id_type!(BackupId);
id_type!(WebhookId);
id_type!(SubscriptionId);
id_type!(EventId);
id_type!(AnnotationId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_26_chars_and_wire_safe() {
        let id = ClusterId::new();
        assert_eq!(id.as_str().len(), 26);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(ClusterId::new(), ClusterId::new());
    }
}
