// Generates a protocol-number newtype with named constants, a strum-backed
// name table and serde support.
//
// The generated struct is `repr(transparent)` over its zerocopy storage so it
// can sit directly inside wire headers and flow key structs.
#[macro_export]
macro_rules! protocol_constants {
    (@construct_u8 $ztype:ty, $val:expr) => { $val };

    (@construct_new $ztype:ty, $val:expr) => { <$ztype>::new($val) };

    (@impl $(#[$outer:meta])*, $type_name:ident, $ztype:ty, $primitive:ty, $strategy:ident, $( $const_name:ident = $val:expr; )+ ) => {
        paste::paste! {
            #[doc = concat!("Protocol number stored as `", stringify!($ztype), "` in network byte order.")]
            ///
            /// Named constants cover the values the dissector understands plus a few
            /// common neighbours. `Display` prints the kebab-case name, or the hex
            /// value when the number is not in the table.
            $(#[$outer])*
            #[repr(transparent)]
            #[derive(
                Clone,
                Copy,
                PartialEq,
                Eq,
                Hash,
                Debug,
                FromBytes,
                IntoBytes,
                Immutable,
                KnownLayout,
                Unaligned,
            )]
            pub struct $type_name(pub $ztype);

            impl $type_name {
                $(
                    pub const $const_name: $type_name = $type_name($crate::protocol_constants!(@$strategy $ztype, $val));
                )+

                /// Returns true when the number has a name in the table.
                pub fn is_known(&self) -> bool {
                    let p: $primitive = self.0.into();
                    <[< $type_name Name >] as std::convert::TryFrom<$primitive>>::try_from(p).is_ok()
                }

                /// Host-order value.
                #[inline]
                pub fn value(&self) -> $primitive {
                    self.0.into()
                }
            }

            // All-zero is the "not yet dissected" value inside flow keys.
            impl Default for $type_name {
                fn default() -> Self {
                    Self($crate::protocol_constants!(@$strategy $ztype, 0))
                }
            }

            #[derive(Debug, PartialEq, strum::EnumString, strum::IntoStaticStr, Clone, Copy)]
            #[strum(serialize_all = "kebab-case")]
            #[allow(non_camel_case_types)]
            enum [< $type_name Name >] {
                $(
                    $const_name,
                )+
            }

            impl From<[< $type_name Name >]> for $primitive {
                fn from(v: [< $type_name Name >]) -> Self {
                    match v {
                        $(
                            [< $type_name Name >]::$const_name => $val,
                        )+
                    }
                }
            }

            impl TryFrom<$primitive> for [< $type_name Name >] {
                type Error = ();
                fn try_from(v: $primitive) -> Result<Self, Self::Error> {
                    match v {
                        $(
                            $val => Ok([< $type_name Name >]::$const_name),
                        )+
                        _ => Err(()),
                    }
                }
            }

            impl From<$primitive> for $type_name {
                fn from(v: $primitive) -> Self {
                    Self(v.into())
                }
            }

            impl From<$type_name> for $primitive {
                fn from(v: $type_name) -> Self {
                    v.0.into()
                }
            }

            impl std::str::FromStr for $type_name {
                type Err = String;

                /// Accepts a table name (`"ipv6"`) or a hex literal (`"0x88ca"`).
                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    if let Ok(variant) = <[< $type_name Name >] as std::str::FromStr>::from_str(s) {
                        let p: $primitive = variant.into();
                        return Ok($type_name(p.into()));
                    }
                    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                        Some(hex) => <$primitive>::from_str_radix(hex, 16)
                            .map(|v| $type_name(v.into()))
                            .map_err(|_| format!("invalid hex: {}", s)),
                        None => Err(format!("unknown {}: {}", stringify!($type_name), s)),
                    }
                }
            }

            #[cfg(feature = "protocol_names")]
            impl serde::Serialize for $type_name {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    serializer.serialize_str(&self.to_string())
                }
            }

            #[cfg(feature = "protocol_names")]
            impl<'de> serde::Deserialize<'de> for $type_name {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: serde::Deserializer<'de>,
                {
                    let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                    <$type_name as std::str::FromStr>::from_str(&s).map_err(serde::de::Error::custom)
                }
            }

            impl std::fmt::Display for $type_name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    let val: $primitive = self.0.into();
                    match <[< $type_name Name >] as std::convert::TryFrom<$primitive>>::try_from(val) {
                        Ok(name) => {
                            let s: &'static str = name.into();
                            f.write_str(s)
                        }
                        Err(()) => write!(f, "0x{:x}", val),
                    }
                }
            }

            #[cfg(not(feature = "protocol_names"))]
            impl serde::Serialize for $type_name {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    let val: $primitive = self.0.into();
                    serde::Serialize::serialize(&val, serializer)
                }
            }

            #[cfg(not(feature = "protocol_names"))]
            impl<'de> serde::Deserialize<'de> for $type_name {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: serde::Deserializer<'de>,
                {
                    let val = <$primitive as serde::Deserialize>::deserialize(deserializer)?;
                    Ok($type_name(val.into()))
                }
            }
        }
    };

    (   $(#[$outer:meta])*
        $type_name:ident,
        u8,
        $primitive:ty:
        $( $const_name:ident = $val:expr; )+
    ) => {
        $crate::protocol_constants!(@impl $(#[$outer])*, $type_name, u8, $primitive, construct_u8, $( $const_name = $val; )+ );
    };

    (   $(#[$outer:meta])*
        $type_name:ident,
        $ztype:ty,
        $primitive:ty:
        $( $const_name:ident = $val:expr; )+
    ) => {
        $crate::protocol_constants!(@impl $(#[$outer])*, $type_name, $ztype, $primitive, construct_new, $( $const_name = $val; )+ );
    };
}
