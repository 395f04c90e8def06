//! Reserved-word lookup.

use super::token::TokenKind;

/// Maps a word to its keyword token, case-insensitively.
pub fn lookup_keyword(text: &str) -> Option<TokenKind> {
    let kind = match text.to_ascii_uppercase().as_str() {
        "SELECT" => TokenKind::Select,
        "FROM" => TokenKind::From,
        "WHERE" => TokenKind::Where,
        "GRANULARITY" => TokenKind::Granularity,
        "DOCUMENT" => TokenKind::Document,
        "SENTENCE" => TokenKind::Sentence,
        "ORDER" => TokenKind::Order,
        "BY" => TokenKind::By,
        "ASC" => TokenKind::Asc,
        "DESC" => TokenKind::Desc,
        "LIMIT" => TokenKind::Limit,
        "AS" => TokenKind::As,
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "NOT" => TokenKind::Not,
        "CONTAINS" => TokenKind::Contains,
        "NER" => TokenKind::Ner,
        "POS" => TokenKind::Pos,
        "DATE" => TokenKind::Date,
        "DEP" => TokenKind::Dep,
        "BETWEEN" => TokenKind::Between,
        "NEAR" => TokenKind::Near,
        "RADIUS" => TokenKind::Radius,
        "SNIPPET" => TokenKind::Snippet,
        "PERSON" => TokenKind::Person,
        "COUNT" => TokenKind::Count,
        "UNIQUE" => TokenKind::Unique,
        "DOCUMENTS" => TokenKind::Documents,
        _ => return None,
    };
    Some(kind)
}

/// True when `text` is a reserved word and cannot be used as a bare name.
pub fn is_reserved_word(text: &str) -> bool {
    lookup_keyword(text).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup_keyword("select"), Some(TokenKind::Select));
        assert_eq!(lookup_keyword("Near"), Some(TokenKind::Near));
        assert_eq!(lookup_keyword("RADIUS"), Some(TokenKind::Radius));
        assert_eq!(lookup_keyword("obama"), None);
    }

    #[test]
    fn reserved_words() {
        assert!(is_reserved_word("contains"));
        assert!(is_reserved_word("DOCUMENTS"));
        assert!(!is_reserved_word("corpus"));
    }
}
