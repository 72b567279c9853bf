use serde::Serialize;

use super::enums::Category;

/// One entry of the intake sequence: what to photograph and how to ask for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Step {
    pub category: Category,
    pub prompt: &'static str,
}

/// The intake sequence. Documents first, then building elements.
pub const STEPS: [Step; 7] = [
    Step {
        category: Category::IdCard,
        prompt: "Upload a photo of the owner's identity card.",
    },
    Step {
        category: Category::TechPassport,
        prompt: "Upload a photo of the technical passport of the property.",
    },
    Step {
        category: Category::Facade,
        prompt: "Upload photos of the facade.",
    },
    Step {
        category: Category::Foundation,
        prompt: "Upload photos of the foundation.",
    },
    Step {
        category: Category::Walls,
        prompt: "Upload photos of the walls.",
    },
    Step {
        category: Category::Roof,
        prompt: "Upload photos of the roof.",
    },
    Step {
        category: Category::Windows,
        prompt: "Upload photos of the windows and doors.",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_appears_once_in_declaration_order() {
        let categories: Vec<Category> = STEPS.iter().map(|s| s.category).collect();
        assert_eq!(categories, Category::ALL.to_vec());
    }

    #[test]
    fn prompts_are_not_empty() {
        assert!(STEPS.iter().all(|s| !s.prompt.trim().is_empty()));
    }
}
