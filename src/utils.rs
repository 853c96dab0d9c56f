use anyhow::{bail, Result};

pub fn parse_bool_input(value: &str) -> Result<bool> {
    let matches_any_ignore_ascii_case = |possibilities: &[&str]| {
        possibilities
            .iter()
            .any(|expected| value.eq_ignore_ascii_case(expected))
    };

    if matches_any_ignore_ascii_case(&["y", "yes", "true", "1"]) {
        return Ok(true);
    }
    if matches_any_ignore_ascii_case(&["n", "no", "false", "0"]) {
        return Ok(false);
    }

    bail!("could not parse {value:?} as a boolean")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_truthy_and_falsy_spellings() {
        assert!(parse_bool_input("yes").unwrap());
        assert!(parse_bool_input("TRUE").unwrap());
        assert!(!parse_bool_input("no").unwrap());
        assert!(!parse_bool_input("0").unwrap());
    }

    #[test]
    fn rejects_anything_else() {
        assert!(parse_bool_input("maybe").is_err());
    }
}
