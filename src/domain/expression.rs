// ============================================================
// Layer 3 — Expression Domain Types
// ============================================================
// The eight Extended Cohn-Kanade classes, one labelled face
// sample, and the two dataset splits the scheduler asks for.

use serde::{Deserialize, Serialize};

/// Number of expression classes every branch predicts.
pub const NUM_CLASSES: usize = 8;

/// Facial expression classes, in label order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expression {
    Neutral,
    Happy,
    Sad,
    Surprise,
    Fear,
    Disgust,
    Anger,
    Contempt,
}

impl Expression {
    pub const ALL: [Expression; NUM_CLASSES] = [
        Expression::Neutral,
        Expression::Happy,
        Expression::Sad,
        Expression::Surprise,
        Expression::Fear,
        Expression::Disgust,
        Expression::Anger,
        Expression::Contempt,
    ];

    /// Integer label used by the loss function.
    pub fn label(self) -> usize {
        self as usize
    }

    pub fn from_label(label: usize) -> Option<Self> {
        Self::ALL.get(label).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Expression::Neutral  => "neutral",
            Expression::Happy    => "happy",
            Expression::Sad      => "sad",
            Expression::Surprise => "surprise",
            Expression::Fear     => "fear",
            Expression::Disgust  => "disgust",
            Expression::Anger    => "anger",
            Expression::Contempt => "contempt",
        }
    }

    /// Parse a dataset class directory name.
    /// Accepts the numeric label ("3") or the name ("Surprise").
    pub fn from_dir_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Ok(label) = name.parse::<usize>() {
            return Self::from_label(label);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.name().eq_ignore_ascii_case(name))
    }
}

/// One grayscale face image with its label.
/// `pixels` is row-major, `height * width` values in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceSample {
    pub pixels: Vec<f32>,
    pub height: usize,
    pub width:  usize,
    pub label:  usize,
}

impl FaceSample {
    pub fn new(pixels: Vec<f32>, height: usize, width: usize, label: usize) -> Self {
        Self { pixels, height, width, label }
    }
}

/// The two splits the scheduler requests from a fold source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Split {
    TrainingLabeled,
    Validation,
}

impl Split {
    pub fn as_str(self) -> &'static str {
        match self {
            Split::TrainingLabeled => "training_labeled",
            Split::Validation      => "validation",
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_follow_declaration_order() {
        for (i, e) in Expression::ALL.iter().enumerate() {
            assert_eq!(e.label(), i);
            assert_eq!(Expression::from_label(i), Some(*e));
        }
        assert_eq!(Expression::from_label(NUM_CLASSES), None);
    }

    #[test]
    fn test_dir_name_parsing() {
        assert_eq!(Expression::from_dir_name("0"), Some(Expression::Neutral));
        assert_eq!(Expression::from_dir_name("Contempt"), Some(Expression::Contempt));
        assert_eq!(Expression::from_dir_name(" happy "), Some(Expression::Happy));
        assert_eq!(Expression::from_dir_name("9"), None);
        assert_eq!(Expression::from_dir_name("bored"), None);
    }
}
