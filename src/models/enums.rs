use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {field} value: {value}")]
pub struct UnknownVariant {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
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
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(UnknownVariant {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

// Declaration order is report section order.
str_enum!(Category {
    IdCard => "id_card",
    TechPassport => "tech_passport",
    Facade => "facade",
    Foundation => "foundation",
    Walls => "walls",
    Roof => "roof",
    Windows => "windows",
});

str_enum!(DocType {
    Identity => "identity",
    PropertyTitle => "property_title",
});

str_enum!(SessionPhase {
    Collecting => "collecting",
    Finalizing => "finalizing",
});

impl Category {
    pub const ALL: [Category; 7] = [
        Category::IdCard,
        Category::TechPassport,
        Category::Facade,
        Category::Foundation,
        Category::Walls,
        Category::Roof,
        Category::Windows,
    ];

    /// Human-readable element name used in prompts and the report.
    pub fn label(&self) -> &'static str {
        match self {
            Self::IdCard => "Identity card",
            Self::TechPassport => "Technical passport",
            Self::Facade => "Facade",
            Self::Foundation => "Foundation",
            Self::Walls => "Walls",
            Self::Roof => "Roof",
            Self::Windows => "Windows and doors",
        }
    }

    /// Document categories carry fields to extract; the rest are building elements.
    pub fn doc_type(&self) -> Option<DocType> {
        match self {
            Self::IdCard => Some(DocType::Identity),
            Self::TechPassport => Some(DocType::PropertyTitle),
            _ => None,
        }
    }

    pub fn is_structural(&self) -> bool {
        self.doc_type().is_none()
    }

    pub fn structural() -> impl Iterator<Item = Category> {
        Self::ALL.into_iter().filter(|c| c.is_structural())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn category_round_trips_through_str() {
        for category in Category::ALL {
            assert_eq!(Category::from_str(category.as_str()).unwrap(), category);
        }
    }

    #[test]
    fn unknown_category_is_rejected() {
        let err = Category::from_str("chimney").unwrap_err();
        assert_eq!(err.field, "Category");
        assert_eq!(err.value, "chimney");
    }

    #[test]
    fn only_documents_have_doc_types() {
        assert_eq!(Category::IdCard.doc_type(), Some(DocType::Identity));
        assert_eq!(Category::TechPassport.doc_type(), Some(DocType::PropertyTitle));
        let structural: Vec<_> = Category::structural().collect();
        assert_eq!(
            structural,
            vec![
                Category::Facade,
                Category::Foundation,
                Category::Walls,
                Category::Roof,
                Category::Windows
            ]
        );
    }

    #[test]
    fn ordering_follows_declaration() {
        let mut shuffled = vec![Category::Roof, Category::IdCard, Category::Walls];
        shuffled.sort();
        assert_eq!(shuffled, vec![Category::IdCard, Category::Walls, Category::Roof]);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&Category::TechPassport).unwrap();
        assert_eq!(json, "\"tech_passport\"");
    }
}
