//! Program images: one base-2 byte per line, `#` starts a comment.

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Line {line}: invalid byte {text:?}")]
    InvalidByte { line: usize, text: String },
    #[error("Failed to read program")]
    Io(#[from] io::Error),
}

pub fn parse_program(source: &str) -> Result<Vec<u8>, ParseError> {
    let mut program = vec![];
    for (index, line) in source.lines().enumerate() {
        let code = match line.split_once('#') {
            Some((code, _comment)) => code,
            None => line,
        }
        .trim();
        if code.is_empty() {
            continue;
        }

        let byte = u8::from_str_radix(code, 2).map_err(|_| ParseError::InvalidByte {
            line: index + 1,
            text: code.to_string(),
        })?;
        program.push(byte);
    }
    Ok(program)
}

pub fn read_program(path: impl AsRef<Path>) -> Result<Vec<u8>, ParseError> {
    parse_program(&fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blank_lines() {
        let source = "\
# print8.ls8
10000010 # LDI R0,8
00000000

00001000
01000111 # PRN R0
00000000
00000001 # HLT
";
        assert_eq!(
            parse_program(source).unwrap(),
            vec![0x82, 0x00, 0x08, 0x47, 0x00, 0x01]
        );
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(parse_program("  101\t\r\n").unwrap(), vec![5]);
    }

    #[test]
    fn reports_line_of_bad_byte() {
        let err = parse_program("00000001\n# ok\n0102\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidByte { line: 3, ref text } if text == "0102"
        ));
    }

    #[test]
    fn rejects_values_wider_than_a_byte() {
        assert!(matches!(
            parse_program("100000000"),
            Err(ParseError::InvalidByte { line: 1, .. })
        ));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            read_program("does/not/exist.ls8"),
            Err(ParseError::Io(_))
        ));
    }
}
