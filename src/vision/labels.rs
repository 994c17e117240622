use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LabelError {
    #[error("class label table is empty")]
    Empty,

    #[error("class {index} label {label:?} must be exactly one character")]
    NotASingleChar { index: usize, label: String },
}

/// Class index -> character table
#[derive(Debug, Clone, PartialEq)]
pub struct ClassLabels {
    letters: Vec<char>,
}

impl ClassLabels {
    pub fn new(letters: Vec<char>) -> Result<Self, LabelError> {
        if letters.is_empty() {
            return Err(LabelError::Empty);
        }
        Ok(Self { letters })
    }

    pub fn from_strings(labels: &[String]) -> Result<Self, LabelError> {
        let letters = labels
            .iter()
            .enumerate()
            .map(|(index, label)| {
                let mut chars = label.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(LabelError::NotASingleChar {
                        index,
                        label: label.clone(),
                    }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(letters)
    }

    /// `None` for indices outside the table
    pub fn letter_for(&self, class: usize) -> Option<char> {
        self.letters.get(class).copied()
    }

    pub fn len(&self) -> usize {
        self.letters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }
}
