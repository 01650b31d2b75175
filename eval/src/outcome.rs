//! Outcome classification for one eval run.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use rff::core::arith::{Rational, evaluate};
use rff::looping::{ExhaustedError, Solution};

use crate::case::Problem;

/// Gold answers within this distance count as matching.
const GOLD_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Solved,
    Wrong,
    Exhausted,
    Error,
}

pub fn classify_outcome(result: &Result<Solution>, problem: &Problem) -> Outcome {
    match result {
        Ok(solution) => {
            if answer_matches(problem, &solution.answer) {
                Outcome::Solved
            } else {
                Outcome::Wrong
            }
        }
        Err(err) if err.downcast_ref::<ExhaustedError>().is_some() => Outcome::Exhausted,
        Err(_) => Outcome::Error,
    }
}

/// Independent answer check, so unverified (no-gold) answers are still judged.
pub fn answer_matches(problem: &Problem, answer: &str) -> bool {
    match problem {
        Problem::Game24 { numbers } => {
            let Ok(evaluation) = evaluate(answer) else {
                return false;
            };
            let mut used = evaluation.literals;
            let mut expected = numbers.clone();
            used.sort_unstable();
            expected.sort_unstable();
            evaluation.value == Rational::integer(24) && used == expected
        }
        Problem::Word { gold: None, .. } => true,
        Problem::Word {
            gold: Some(gold), ..
        } => parse_number(answer).is_some_and(|got| (got - gold).abs() <= GOLD_TOLERANCE),
    }
}

fn parse_number(answer: &str) -> Option<f64> {
    answer
        .trim()
        .trim_matches('"')
        .trim_start_matches('$')
        .replace(',', "")
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use rff::core::workspace::Workspace;

    fn solution(answer: &str) -> Result<Solution> {
        Ok(Solution {
            objective: "24".to_string(),
            answer: answer.to_string(),
            iterations: 1,
            workspace: Workspace::new(),
        })
    }

    fn game24() -> Problem {
        Problem::Game24 {
            numbers: vec![1, 2, 5, 9],
        }
    }

    #[test]
    fn solved_when_expression_uses_all_numbers() {
        let outcome = classify_outcome(&solution("(9 - 1) * (5 - 2)"), &game24());
        assert_eq!(outcome, Outcome::Solved);
    }

    #[test]
    fn wrong_when_expression_misses_numbers_or_target() {
        assert_eq!(
            classify_outcome(&solution("(9 - 1) * 3"), &game24()),
            Outcome::Wrong
        );
        assert_eq!(
            classify_outcome(&solution("9 + 1 + 5 + 2"), &game24()),
            Outcome::Wrong
        );
    }

    #[test]
    fn overflowing_answer_is_wrong() {
        let answer = "-9223372036854775808*9223372036854775808*2";
        assert_eq!(classify_outcome(&solution(answer), &game24()), Outcome::Wrong);
    }

    #[test]
    fn word_answers_compare_with_gold() {
        let problem = Problem::Word {
            question: "q".to_string(),
            gold: Some(1200.0),
        };
        assert_eq!(classify_outcome(&solution("$1,200"), &problem), Outcome::Solved);
        assert_eq!(classify_outcome(&solution("1199"), &problem), Outcome::Wrong);
        let ungraded = Problem::Word {
            question: "q".to_string(),
            gold: None,
        };
        assert_eq!(classify_outcome(&solution("7"), &ungraded), Outcome::Solved);
    }

    #[test]
    fn exhausted_and_errors_are_distinguished() {
        let exhausted: Result<Solution> = Err(ExhaustedError {
            objective: "24".to_string(),
            max_iterations: 3,
        }
        .into());
        assert_eq!(classify_outcome(&exhausted, &game24()), Outcome::Exhausted);
        let failed: Result<Solution> = Err(anyhow!("backend down"));
        assert_eq!(classify_outcome(&failed, &game24()), Outcome::Error);
    }
}
