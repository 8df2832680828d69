use sf_tester::FuzzError;

pub(crate) fn emit_error(error: FuzzError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code());
    println!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&error.to_string()).expect("string json")
    );
    1
}

#[cfg(test)]
mod error_map_tests {
    use super::*;

    #[test]
    fn emit_error_returns_non_zero_exit_code() {
        assert_eq!(emit_error(FuzzError::InvalidRunCount), 1);
        assert_eq!(
            emit_error(FuzzError::StoryFileMissing {
                story_file: "main.ink".to_string()
            }),
            1
        );
    }
}
