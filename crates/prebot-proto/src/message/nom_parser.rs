//! Nom-based line parser.
//!
//! Produces borrowed slices into the input line; [`super::Message`] turns
//! them into owned values.

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

/// Parse the sender prefix: everything after the leading `:` up to the
/// first space.
fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Parse the command name (1*letter or 3digit).
fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;

    let is_all_letters = cmd.chars().all(|c| c.is_ascii_alphabetic());
    let is_three_digits = cmd.len() == 3 && cmd.chars().all(|c| c.is_ascii_digit());

    if is_all_letters || is_three_digits {
        Ok((rest, cmd))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )))
    }
}

/// Split the remainder after the command into middle parameters and an
/// optional trailing parameter.
///
/// The first `" :"` starts the trailing parameter, which runs to the end of
/// the line and may contain spaces and further `" :"` sequences. Runs of
/// spaces between middle parameters are collapsed.
fn parse_params(input: &str) -> (SmallVec<[&str; 15]>, Option<&str>) {
    let mut params: SmallVec<[&str; 15]> = SmallVec::new();
    let mut rest = input;

    while rest.starts_with(' ') {
        rest = rest.trim_start_matches(' ');

        if rest.is_empty() {
            break;
        }

        if let Some(trailing) = rest.strip_prefix(':') {
            return (params, Some(trailing));
        }

        let end = rest.find(' ').unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    (params, None)
}

fn parse_message(input: &str) -> IResult<&str, ParsedMessage<'_>> {
    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;
    let (input, command) = parse_command(input)?;
    let (params, trailing) = parse_params(input);

    Ok((
        "",
        ParsedMessage {
            prefix,
            command,
            params,
            trailing,
        },
    ))
}

/// A parsed line holding slices of the original input.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedMessage<'a> {
    /// Sender without the leading `:`.
    pub prefix: Option<&'a str>,
    /// Command name or numeric.
    pub command: &'a str,
    /// Middle parameters.
    pub params: SmallVec<[&'a str; 15]>,
    /// Trailing parameter without its leading `:`.
    pub trailing: Option<&'a str>,
}

impl<'a> ParsedMessage<'a> {
    /// Parse a line that has already had its terminator removed.
    ///
    /// On failure returns the byte offset at which the grammar stopped
    /// matching.
    pub fn parse(input: &'a str) -> Result<Self, usize> {
        match parse_message(input) {
            Ok((_, msg)) => Ok(msg),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(input.len() - e.input.len()),
            Err(nom::Err::Incomplete(_)) => Err(input.len()),
        }
    }
}
