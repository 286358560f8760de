use serde::{Deserialize, Serialize};

/// A string did not name any variant of a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value for {field}: {value}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

// Closed vocabulary the predictor output is validated against.
str_enum!(Category {
    Dining => "Dining",
    Transportation => "Transportation",
    Entertainment => "Entertainment",
    Groceries => "Groceries",
    Electronics => "Electronics",
    Other => "Other",
});

str_enum!(SessionStage {
    Idle => "idle",
    Extracting => "extracting",
    FieldsReady => "fields_ready",
    Categorizing => "categorizing",
    Persisted => "persisted",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl SessionStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Persisted | Self::Failed | Self::Cancelled)
    }

    /// Legal edges of the session state machine.
    ///
    /// `Idle -> FieldsReady` covers manual entry and edits, which skip OCR.
    /// Every non-terminal stage may be cancelled.
    pub fn can_transition_to(&self, next: SessionStage) -> bool {
        use SessionStage::*;
        match (self, next) {
            (Idle, Extracting) | (Idle, FieldsReady) => true,
            (Extracting, FieldsReady) => true,
            (FieldsReady, Categorizing) => true,
            (Categorizing, Persisted) => true,
            (Idle, Failed) | (Extracting, Failed) | (Categorizing, Failed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}
