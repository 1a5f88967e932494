//! Shared helpers for the constant lookup tables

/// Declare a closed code-to-name enumeration with an `Unknown(code)` fallback.
///
/// Generates `from_code`, `code`, `name` and `ALL` (known variants in table
/// order).
macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ty {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal => $label:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant, )*
            Unknown($repr),
        }

        impl $name {
            pub const ALL: &'static [$name] = &[ $( $name::$variant, )* ];

            pub fn from_code(code: $repr) -> Self {
                match code {
                    $( $code => $name::$variant, )*
                    other => $name::Unknown(other),
                }
            }

            pub fn code(&self) -> $repr {
                match self {
                    $( $name::$variant => $code, )*
                    $name::Unknown(code) => *code,
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label, )*
                    $name::Unknown(_) => "unknown",
                }
            }
        }

        impl From<$repr> for $name {
            fn from(code: $repr) -> Self {
                $name::from_code(code)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $name::Unknown(code) => write!(f, "unknown(0x{:X})", code),
                    known => f.write_str(known.name()),
                }
            }
        }
    };
}

/// Expand the set bits of `value` into names from an ordered `(name, mask)`
/// table.
pub(crate) fn flag_names<T>(table: &[(&'static str, T)], value: T) -> Vec<&'static str>
where
    T: Copy + PartialEq + std::ops::BitAnd<Output = T> + Default,
{
    table
        .iter()
        .filter(|(_, mask)| *mask != T::default() && value & *mask == *mask)
        .map(|(name, _)| *name)
        .collect()
}
