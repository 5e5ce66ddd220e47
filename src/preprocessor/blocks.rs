// Structural scanning helpers shared by the preprocessor checks and the evaluator

use crate::lexer::{Token, TokenKind};

/// Position of the first EOL at or after `pos` (or `end`)
pub fn line_end(tokens: &[Token], pos: usize, end: usize) -> usize {
    let mut i = pos;
    while i < end && tokens[i].kind != TokenKind::Eol {
        i += 1;
    }
    i
}

/// Position of `Then` on the line starting after an `If`/`ElseIf` at `pos`
pub fn find_then(tokens: &[Token], pos: usize, end: usize) -> Option<usize> {
    let mut i = pos + 1;
    while i < end {
        match tokens[i].kind {
            TokenKind::Then => return Some(i),
            TokenKind::Eol => return None,
            _ => i += 1,
        }
    }
    None
}

/// `If <cond> Then <statement>` carries its body on the same line and has no `EndIf`
pub fn is_single_line_if(tokens: &[Token], pos: usize, end: usize) -> bool {
    match find_then(tokens, pos, end) {
        Some(then) => match tokens.get(then + 1) {
            Some(next) if then + 1 < end => !next.ends_line(),
            _ => false,
        },
        None => false,
    }
}

/// Position of the `EndIf` some scripts put after a single-line If body
pub fn trailing_endif(tokens: &[Token], pos: usize, end: usize) -> Option<usize> {
    if tokens[pos].kind != TokenKind::If || !is_single_line_if(tokens, pos, end) {
        return None;
    }
    let stop = statement_end(tokens, pos, end);
    (stop > pos + 1 && tokens[stop - 1].kind == TokenKind::EndIf).then(|| stop - 1)
}

/// Keywords that open a multi-line block closed by a matching keyword
pub fn opens_block(tokens: &[Token], pos: usize, end: usize) -> bool {
    match tokens[pos].kind {
        TokenKind::If => !is_single_line_if(tokens, pos, end),
        TokenKind::Switch | TokenKind::Select | TokenKind::While | TokenKind::Do => true,
        _ => false,
    }
}

pub fn closes_block(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::EndIf | TokenKind::EndSwitch | TokenKind::EndSelect | TokenKind::WEnd | TokenKind::Until
    )
}

pub fn closer_for(opener: TokenKind) -> Option<TokenKind> {
    match opener {
        TokenKind::If => Some(TokenKind::EndIf),
        TokenKind::Switch => Some(TokenKind::EndSwitch),
        TokenKind::Select => Some(TokenKind::EndSelect),
        TokenKind::While => Some(TokenKind::WEnd),
        TokenKind::Do => Some(TokenKind::Until),
        _ => None,
    }
}

/// Walks `tokens[start..end]` and reports every token met at nesting depth
/// zero (relative to `start`). The callback returns `true` to stop; the
/// position it stopped at is returned.
pub fn scan_depth_zero(
    tokens: &[Token],
    start: usize,
    end: usize,
    mut visit: impl FnMut(usize, &Token) -> bool,
) -> Option<usize> {
    let mut depth = 0usize;
    let mut skip = None;
    let mut i = start;
    while i < end {
        let token = &tokens[i];
        if skip == Some(i) {
            i += 1;
            continue;
        }
        if depth == 0 && visit(i, token) {
            return Some(i);
        }
        if let Some(endif) = trailing_endif(tokens, i, end) {
            skip = Some(endif);
        } else if opens_block(tokens, i, end) {
            depth += 1;
        } else if closes_block(token.kind) && depth > 0 {
            depth -= 1;
        }
        i += 1;
    }
    None
}

/// Position of the first EOL or comment at or after `pos` (or `end`)
pub fn statement_end(tokens: &[Token], pos: usize, end: usize) -> usize {
    let mut i = pos;
    while i < end && !tokens[i].ends_line() {
        i += 1;
    }
    i
}
