//! Status lifecycles.
//!
//! Every document status (sales order, GRN, MRN, production stage, ...) is a
//! typed enum that lists its allowed next states. Services never assign a
//! status directly; they go through [`Lifecycle::transition`], so a skipped or
//! repeated step surfaces as `INVALID_STATE` instead of being written.
//!
//! ```text
//! DRAFT ──► RECEIVED ──► VERIFIED ──► APPROVED
//!   │           │            │
//!   └───────────┴────────────┴──► REJECTED
//! ```

use std::fmt;

use crate::ServiceError;

/// A status enum with an explicit transition table.
pub trait Lifecycle: Copy + Eq + fmt::Debug + fmt::Display + 'static {
    /// Entity name used in messages and status history, e.g. `"sales_order"`.
    const ENTITY: &'static str;

    /// States reachable in one step from `self`.
    fn next_states(&self) -> &'static [Self];

    /// A state with no outgoing edges.
    fn is_terminal(&self) -> bool {
        self.next_states().is_empty()
    }

    fn can_transition_to(&self, next: Self) -> bool {
        self.next_states().contains(&next)
    }

    /// Validate the edge `self → next` for the document identified by `label`
    /// (usually its human-facing number).
    fn transition(&self, next: Self, label: &str) -> Result<Self, ServiceError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ServiceError::InvalidState(format!(
                "{} {} cannot move from {} to {}",
                Self::ENTITY.replace('_', " "),
                label,
                self,
                next
            )))
        }
    }
}

/// Declare a status enum serialized as SCREAMING_SNAKE_CASE strings, with
/// `as_str`, `parse`, `ALL` and `Display`.
///
/// ```ignore
/// status_enum! {
///     /// Sales order status.
///     pub enum SalesOrderStatus {
///         Draft => "DRAFT",
///         Confirmed => "CONFIRMED",
///     }
/// }
/// ```
#[macro_export]
macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        $vis enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $( $text => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Parse an optional status filter from a query string, rejecting unknown values.
pub fn parse_status_filter<S>(
    raw: Option<&str>,
    parse: fn(&str) -> Option<S>,
) -> Result<Option<S>, ServiceError> {
    match raw {
        None => Ok(None),
        Some(s) => parse(s)
            .map(Some)
            .ok_or_else(|| ServiceError::Validation(format!("unknown status filter '{s}'"))),
    }
}
