//! String identifiers that cannot be mixed up with one another.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };

    ($(#[$doc:meta])* $name:ident, prefix = $prefix:literal) => {
        define_id!($(#[$doc])* $name);

        impl $name {
            /// Fresh identifier, unique within this process.
            pub fn generate() -> Self {
                Self(format!(concat!($prefix, "_{}"), unique_suffix()))
            }
        }
    };
}

define_id!(
    /// Catalog SKU, chosen by the catalog rather than generated.
    ProductId
);
define_id!(
    /// Internal order key; buyers see the order number instead.
    OrderId,
    prefix = "ord"
);
define_id!(
    /// One buyer's pass through the checkout steps.
    CheckoutId,
    prefix = "chk"
);

/// Hex nanosecond timestamp followed by a 16-bit process counter.
fn unique_suffix() -> String {
    use std::sync::atomic::{AtomicU16, Ordering};

    static SEQUENCE: AtomicU16 = AtomicU16::new(0);

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos() as u64);
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);

    format!("{nanos:x}{sequence:04x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_prefixed_and_distinct() {
        let first = OrderId::generate();
        let second = OrderId::generate();
        assert!(first.as_str().starts_with("ord_"));
        assert!(CheckoutId::generate().as_str().starts_with("chk_"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_display_and_conversions() {
        let id: ProductId = "harina-pan-1kg".into();
        assert_eq!(id.to_string(), "harina-pan-1kg");
        assert_eq!(id.as_ref(), "harina-pan-1kg");
        assert_eq!(id.into_inner(), "harina-pan-1kg");
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = ProductId::new("arroz");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""arroz""#);
        let back: ProductId = serde_json::from_str(r#""arroz""#).unwrap();
        assert_eq!(back, id);
    }
}
