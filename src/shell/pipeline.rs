use snafu::{Snafu, ensure};

/// One lexed element of a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Pipe,
}

/// POSIX-ish lexer: whitespace splits words, single quotes are literal,
/// double quotes and bare words honor backslash escapes, and `|` is an
/// operator token even when glued to a word.
pub fn tokenize(line: &str) -> Result<Vec<Token>, PipelineError> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut has_word = false;
    let mut chars = line.chars();

    let flush = |word: &mut String, has_word: &mut bool, tokens: &mut Vec<Token>| {
        if *has_word {
            tokens.push(Token::Word(std::mem::take(word)));
            *has_word = false;
        }
    };

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => flush(&mut word, &mut has_word, &mut tokens),
            '|' => {
                flush(&mut word, &mut has_word, &mut tokens);
                tokens.push(Token::Pipe);
            }
            '\'' => {
                has_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => word.push(c),
                        None => return UnterminatedQuoteSnafu.fail(),
                    }
                }
            }
            '"' => {
                has_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c) => word.push(c),
                            None => return UnterminatedQuoteSnafu.fail(),
                        },
                        Some(c) => word.push(c),
                        None => return UnterminatedQuoteSnafu.fail(),
                    }
                }
            }
            '\\' => {
                has_word = true;
                match chars.next() {
                    Some(c) => word.push(c),
                    None => return UnterminatedQuoteSnafu.fail(),
                }
            }
            c => {
                has_word = true;
                word.push(c);
            }
        }
    }
    flush(&mut word, &mut has_word, &mut tokens);
    Ok(tokens)
}

/// Splits a command line into pipeline stages, each a non-empty argument
/// vector.
pub fn split(line: &str) -> Result<Vec<Vec<String>>, PipelineError> {
    let tokens = tokenize(line)?;
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let mut stages = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        match token {
            Token::Word(word) => current.push(word),
            Token::Pipe => {
                ensure!(!current.is_empty(), EmptyStageSnafu);
                stages.push(std::mem::take(&mut current));
            }
        }
    }
    ensure!(!current.is_empty(), TrailingPipeSnafu);
    stages.push(current);
    Ok(stages)
}

#[derive(Debug, Snafu)]
pub enum PipelineError {
    #[snafu(display("unterminated quote"))]
    UnterminatedQuote,
    #[snafu(display("empty command in pipeline"))]
    EmptyStage,
    #[snafu(display("trailing pipe with no command"))]
    TrailingPipe,
}
