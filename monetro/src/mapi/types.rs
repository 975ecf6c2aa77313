use std::fmt;

/// The scan target a column decodes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    Text,
    Bytes,
    Bool,
    Float32,
    Float64,
    Int8,
    Int16,
    Int32,
    Int64,
    /// date, time or timestamp
    Temporal,
    /// type unknown or untyped `NULL`
    Null,
}

macro_rules! monet_type {
    ($($variant:ident => $name:literal, $scan:ident $(, $doc:literal)?;)*) => {
        /// Column type name as reported by the `type` column header.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum MonetType {
            $(
                $(#[doc = $doc])?
                $variant,
            )*
        }

        impl MonetType {
            /// Resolve type from its protocol name.
            pub fn from_name(name: &str) -> Option<MonetType> {
                match name {
                    $($name => Some(MonetType::$variant),)*
                    _ => None,
                }
            }

            /// Returns the protocol name.
            pub const fn name(self) -> &'static str {
                match self {
                    $(MonetType::$variant => $name,)*
                }
            }

            /// Returns the scan target of this type.
            pub const fn scan_type(self) -> ScanType {
                match self {
                    $(MonetType::$variant => ScanType::$scan,)*
                }
            }
        }
    };
}

monet_type! {
    Char => "char", Text, "(L) character string with length L";
    Varchar => "varchar", Text, "(L) string with at most length L";
    Clob => "clob", Text;
    Blob => "blob", Bytes;
    Decimal => "decimal", Float64, "(P,S)";
    Tinyint => "tinyint", Int8, "8 bit integer";
    Smallint => "smallint", Int16, "16 bit integer";
    Shortint => "shortint", Int16;
    Int => "int", Int32, "32 bit integer";
    Mediumint => "mediumint", Int32;
    Wrd => "wrd", Int32;
    Bigint => "bigint", Int64, "64 bit integer";
    Hugeint => "hugeint", Int64, "128 bit on the server, narrowed to 64 bit";
    Serial => "serial", Int64, "64 bit sequence generator";
    Longint => "longint", Int64;
    Real => "real", Float32, "32 bit floating point";
    Float => "float", Float32;
    Double => "double", Float64, "64 bit floating point";
    Boolean => "boolean", Bool;
    Date => "date", Temporal;
    Time => "time", Temporal, "(T) time of day";
    Timetz => "timetz", Temporal;
    Timestamp => "timestamp", Temporal, "(T) date concatenated with time";
    Timestamptz => "timestamptz", Temporal;
    Interval => "interval", Text, "(Q) a temporal interval";
    MonthInterval => "month_interval", Text;
    SecInterval => "sec_interval", Text;
    Json => "json", Text;
    Uuid => "uuid", Text;
    Url => "url", Text;
    Inet => "inet", Text;
    Null => "NULL", Null;
}

impl MonetType {
    /// Returns `true` for types decoded as quoted, escaped text.
    pub const fn is_text(self) -> bool {
        matches!(self.scan_type(), ScanType::Text)
    }
}

impl fmt::Display for MonetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
