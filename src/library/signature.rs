//! C prototype strings, read with the C++ lexer and type grammar.

use crate::error::{BindingError, ParseError};
use crate::lexer::{Grammar, Keyword, Lexer, TokenType};
use crate::parser::cpp::CppParser;
use crate::parser::ExpressionParser;
use crate::types::{Signature, Type};

fn prototype_error(prototype: &str, err: impl ToString) -> BindingError {
    BindingError::Prototype {
        prototype: prototype.to_string(),
        message: err.to_string(),
    }
}

fn parser_for(text: &str) -> Result<CppParser, BindingError> {
    let tokens = Lexer::new(text, Grammar::Cpp)
        .tokenize()
        .map_err(|err| prototype_error(text, err))?;
    Ok(CppParser::new(tokens))
}

/// Parse `"int printf(string, ...)"`. A constructor prototype omits the
/// return type: `"FILE(string, string)"`.
pub fn parse_prototype(prototype: &str) -> Result<Signature, BindingError> {
    let mut parser = parser_for(prototype)?;
    read_prototype(&mut parser).map_err(|err| prototype_error(prototype, err))
}

fn read_prototype(parser: &mut CppParser) -> Result<Signature, ParseError> {
    let is_constructor = matches!(parser.cursor().peek().token_type, TokenType::Identifier(_))
        && parser.cursor().peek_at(1).token_type == TokenType::LeftParen;
    let return_type = if is_constructor {
        Type::Void
    } else {
        parser.parse_type()?.0
    };
    let (name, _) = parser.cursor().consume_identifier("function name")?;
    parser.cursor().consume(&TokenType::LeftParen, "'('")?;

    let mut params = Vec::new();
    let mut variadic = false;
    let only_void = parser.cursor().check_keyword(Keyword::Void)
        && parser.cursor().peek_at(1).token_type == TokenType::RightParen;
    if only_void {
        parser.cursor().advance(); // consume 'void'
    }
    while !parser.cursor().check(&TokenType::RightParen) {
        if parser.cursor().match_token(&TokenType::Ellipsis) {
            variadic = true;
            break;
        }
        let (mut param_type, _) = parser.parse_type()?;
        if let TokenType::Identifier(_) = parser.cursor().peek().token_type {
            parser.cursor().advance(); // parameter name is informational
        }
        while parser.cursor().check(&TokenType::LeftBracket) {
            parser.cursor().advance();
            parser.cursor().consume(&TokenType::RightBracket, "']'")?;
            param_type = Type::Array(Box::new(param_type));
        }
        if param_type == Type::Void {
            return Err(parser.cursor().invalid("parameter of type void"));
        }
        params.push(param_type);
        if !parser.cursor().match_token(&TokenType::Comma) {
            break;
        }
    }
    parser.cursor().consume(&TokenType::RightParen, "')'")?;
    parser.cursor().match_token(&TokenType::Semicolon);
    if !parser.cursor().is_at_end() {
        return Err(parser.cursor().error_expected("end of prototype"));
    }

    Ok(Signature {
        name,
        params,
        variadic,
        return_type,
    })
}

/// Parse a host field declaration such as `"int tm_sec"`.
pub fn parse_field(declaration: &str) -> Result<(String, Type), BindingError> {
    let mut parser = parser_for(declaration)?;
    read_field(&mut parser).map_err(|err| prototype_error(declaration, err))
}

fn read_field(parser: &mut CppParser) -> Result<(String, Type), ParseError> {
    let (field_type, _) = parser.parse_type()?;
    let (name, _) = parser.cursor().consume_identifier("field name")?;
    parser.cursor().match_token(&TokenType::Semicolon);
    if !parser.cursor().is_at_end() {
        return Err(parser.cursor().error_expected("end of field declaration"));
    }
    if field_type == Type::Void {
        return Err(parser.cursor().invalid("field of type void"));
    }
    Ok((name, field_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_prototypes() {
        let sig = parse_prototype("int printf(const char *format, ...)").unwrap();
        assert_eq!(sig.name, "printf");
        assert_eq!(sig.params, vec![Type::String]);
        assert!(sig.variadic);
        assert_eq!(sig.return_type, Type::Int);

        let sig = parse_prototype("double atan2(double, double);").unwrap();
        assert_eq!(sig.params, vec![Type::Float, Type::Float]);

        let sig = parse_prototype("int rand(void)").unwrap();
        assert!(sig.params.is_empty());

        let sig = parse_prototype("void *memset(int s[], int c, int n)").unwrap();
        assert_eq!(sig.return_type, Type::Any);
        assert_eq!(sig.params[0], Type::Array(Box::new(Type::Int)));

        let sig = parse_prototype("FILE *fopen(string, string)").unwrap();
        assert_eq!(sig.return_type, Type::Named("FILE".into()));
    }

    #[test]
    fn test_constructor_prototype_has_no_return_type() {
        let sig = parse_prototype("FILE(string path, string mode)").unwrap();
        assert_eq!(sig.name, "FILE");
        assert_eq!(sig.return_type, Type::Void);
        assert_eq!(sig.params.len(), 2);
    }

    #[test]
    fn test_malformed_prototypes() {
        for bad in ["int", "int f(", "int f(int) extra", "int f(void x)", "int f(\"s)"] {
            assert!(
                matches!(parse_prototype(bad), Err(BindingError::Prototype { .. })),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_fields() {
        assert_eq!(parse_field("int tm_sec").unwrap(), ("tm_sec".to_string(), Type::Int));
        assert_eq!(
            parse_field("const char *name;").unwrap(),
            ("name".to_string(), Type::String)
        );
        assert!(parse_field("int").is_err());
    }
}
