//! Macro for implementing Display and FromStr for wire-level enums
//!
//! Enums such as `Role` travel as lowercase strings in JSON bodies and URL
//! paths. This macro keeps the string form in one place for both
//! directions, with case-insensitive parsing.
//!
//! # Example
//!
//! ```rust
//! use quill_domain::impl_wire_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Visibility {
//!     Public,
//!     Draft,
//! }
//!
//! impl_wire_enum_conversions!(Visibility {
//!     Public => "public",
//!     Draft => "draft",
//! });
//!
//! assert_eq!(Visibility::Draft.to_string(), "draft");
//! assert_eq!("PUBLIC".parse::<Visibility>(), Ok(Visibility::Public));
//! ```

/// Implements `as_str`, Display and FromStr for a fieldless enum
///
/// Parsing trims whitespace and ignores case; the error is a
/// `QuillError::InvalidInput` naming the enum.
#[macro_export]
macro_rules! impl_wire_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Wire representation
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = $crate::errors::QuillError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err($crate::errors::QuillError::InvalidInput(format!(
                        "Invalid {}: {}",
                        stringify!($enum_name),
                        s
                    ))),
                }
            }
        }
    };
}
