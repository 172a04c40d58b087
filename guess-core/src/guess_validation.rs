use crate::question_pool::Answer;

/// Compares free-text guesses against a round's canonical answer.
pub struct GuessValidator;

impl GuessValidator {
    /// Case- and whitespace-insensitive match, falling back to a numeric
    /// comparison so "12", "12.0" and " 12 " are the same answer.
    pub fn is_correct(guess: &str, answer: &Answer) -> bool {
        let normalized_guess = Self::normalize(guess);
        let normalized_answer = Self::normalize(&answer.to_string());

        if normalized_guess == normalized_answer {
            return true;
        }

        match (
            Self::parse_number(&normalized_guess),
            Self::parse_number(&normalized_answer),
        ) {
            (Some(guess_num), Some(answer_num)) => guess_num == answer_num,
            _ => false,
        }
    }

    pub fn normalize(text: &str) -> String {
        text.trim().to_lowercase()
    }

    fn parse_number(text: &str) -> Option<f64> {
        text.parse::<f64>().ok().filter(|n| n.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(answer: &str) -> Answer {
        Answer::Text(answer.to_string())
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        assert!(GuessValidator::is_correct("otter", &text("Otter")));
        assert!(GuessValidator::is_correct("  OTTER\t", &text("otter")));
        assert!(GuessValidator::is_correct("sea otter", &text(" Sea Otter ")));
        assert!(!GuessValidator::is_correct("otters", &text("otter")));
    }

    #[test]
    fn test_numeric_strings_compare_by_value() {
        let answer = Answer::Number(12.0);
        assert!(GuessValidator::is_correct("12", &answer));
        assert!(GuessValidator::is_correct("12.0", &answer));
        assert!(GuessValidator::is_correct(" 12 ", &answer));
        assert!(GuessValidator::is_correct("12.000", &text("12")));
        assert!(!GuessValidator::is_correct("13", &answer));
        assert!(!GuessValidator::is_correct("Twelve", &answer));
    }

    #[test]
    fn test_number_and_word_never_match() {
        assert!(!GuessValidator::is_correct("7", &text("seven")));
        assert!(!GuessValidator::is_correct("seven", &Answer::Number(7.0)));
    }

    #[test]
    fn test_trailing_garbage_is_not_a_number() {
        assert!(!GuessValidator::is_correct("12abc", &Answer::Number(12.0)));
        assert!(!GuessValidator::is_correct("", &Answer::Number(0.0)));
    }

    #[test]
    fn test_non_finite_values_do_not_match_numerically() {
        assert!(!GuessValidator::is_correct("infinity", &text("inf")));
        assert!(!GuessValidator::is_correct("1e400", &text("1e401")));
    }

    #[test]
    fn test_fractional_answers() {
        let answer = Answer::Number(3.5);
        assert!(GuessValidator::is_correct("3.50", &answer));
        assert!(GuessValidator::is_correct("3.5", &answer));
        assert!(!GuessValidator::is_correct("3", &answer));
    }
}
