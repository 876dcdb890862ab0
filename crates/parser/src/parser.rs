//! Recursive-descent parser with precedence climbing for expressions
//! (spec section 4.3).

use amlp_lexer::{Keyword, Lexer, Token, TokenKind};

use crate::ast::{BinOp, Block, Decl, Expr, FunctionDecl, Param, Program, Stmt, UnOp, VariableDecl};
use crate::error::ParseError;

pub struct Parser {
    lexer: Lexer,
    current: Token,
    previous: Token,
    pub errors: Vec<ParseError>,
    recovering: bool,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        let mut lexer = Lexer::init_from_source(source);
        let first = lexer.next_token();
        let dummy = first.clone();
        Self { lexer, current: first, previous: dummy, errors: Vec::new(), recovering: false }
    }

    fn advance(&mut self) {
        self.previous = self.current.clone();
        self.current = self.lexer.next_token();
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn check_op(&self, op: &str) -> bool {
        matches!(&self.current.kind, TokenKind::Operator(o) if o == op)
    }

    fn match_op(&mut self, op: &str) -> bool {
        if self.check_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) {
        if !self.check(&kind) {
            self.error(&format!("expected {what} but found '{}'", self.current.lexeme()));
            return;
        }
        self.advance();
    }

    fn error(&mut self, message: &str) {
        self.errors.push(ParseError {
            line: self.current.position.line,
            column: self.current.position.column,
            message: message.to_string(),
        });
        self.recovering = true;
    }

    /// Resynchronizes by consuming tokens until a semicolon, a known
    /// keyword, or EOF (spec section 4.3).
    fn synchronize(&mut self) {
        self.advance();
        while !matches!(self.current.kind, TokenKind::Eof) {
            if matches!(self.previous.kind, TokenKind::Semicolon) {
                self.recovering = false;
                return;
            }
            if matches!(self.current.kind, TokenKind::Keyword(_)) {
                self.recovering = false;
                return;
            }
            self.advance();
        }
    }

    pub fn parse_program(mut self) -> (Program, Vec<ParseError>) {
        let mut declarations = Vec::new();
        while !matches!(self.current.kind, TokenKind::Eof) {
            match self.parse_declaration() {
                Some(decl) => declarations.push(decl),
                None => self.synchronize(),
            }
        }
        (Program { declarations }, self.errors)
    }

    fn is_type_start(&self) -> bool {
        match &self.current.kind {
            TokenKind::Keyword(k) => k.is_type_specifier(),
            TokenKind::Identifier(_) => true,
            _ => false,
        }
    }

    fn parse_type(&mut self) -> String {
        let mut type_str = match &self.current.kind {
            TokenKind::Keyword(k) => {
                let s = k.as_str().to_string();
                self.advance();
                s
            }
            TokenKind::Identifier(name) => {
                let s = name.clone();
                self.advance();
                s
            }
            _ => {
                self.error("expected type specifier");
                return "mixed".to_string();
            }
        };
        if self.matches(&TokenKind::LBracket) {
            self.expect(TokenKind::RBracket, "']'");
            type_str.push_str("[]");
        }
        type_str
    }

    fn parse_declaration(&mut self) -> Option<Decl> {
        if !self.is_type_start() {
            self.error(&format!("expected declaration but found '{}'", self.current.lexeme()));
            return None;
        }
        let line = self.current.position.line;
        let type_name = self.parse_type();
        let name = match &self.current.kind {
            TokenKind::Identifier(n) => {
                let n = n.clone();
                self.advance();
                n
            }
            _ => {
                self.error("expected identifier after type specifier");
                return None;
            }
        };

        if self.matches(&TokenKind::LParen) {
            let params = self.parse_param_list();
            self.expect(TokenKind::RParen, "')'");
            let body = self.parse_block();
            Some(Decl::Function(FunctionDecl { return_type: type_name, name, params, body, line }))
        } else {
            let initializer = if self.match_op("=") { Some(self.parse_expression()) } else { None };
            self.expect(TokenKind::Semicolon, "';'");
            Some(Decl::Variable(VariableDecl { type_name, name, initializer, line }))
        }
    }

    fn parse_param_list(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        if matches!(self.current.kind, TokenKind::RParen) {
            return params;
        }
        loop {
            if !self.is_type_start() {
                self.error("expected parameter type");
                break;
            }
            let type_name = self.parse_type();
            let name = match &self.current.kind {
                TokenKind::Identifier(n) => {
                    let n = n.clone();
                    self.advance();
                    n
                }
                _ => {
                    self.error("expected parameter name");
                    break;
                }
            };
            params.push(Param { type_name, name });
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        params
    }

    fn parse_block(&mut self) -> Block {
        self.expect(TokenKind::LBrace, "'{'");
        let mut stmts = Vec::new();
        while !matches!(self.current.kind, TokenKind::RBrace | TokenKind::Eof) {
            match self.parse_statement() {
                Some(stmt) => stmts.push(stmt),
                None => self.synchronize(),
            }
        }
        self.expect(TokenKind::RBrace, "'}'");
        stmts
    }

    fn parse_statement(&mut self) -> Option<Stmt> {
        match &self.current.kind {
            TokenKind::LBrace => Some(Stmt::Block(self.parse_block())),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                self.expect(TokenKind::Semicolon, "';'");
                Some(Stmt::Break)
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                self.expect(TokenKind::Semicolon, "';'");
                Some(Stmt::Continue)
            }
            _ if self.is_type_start() && self.type_start_begins_decl() => {
                self.parse_local_decl()
            }
            _ => {
                let expr = self.parse_expression();
                self.expect(TokenKind::Semicolon, "';'");
                Some(Stmt::Expr(expr))
            }
        }
    }

    /// Disambiguates "identifier as a type" (`foo bar;`) from "identifier as
    /// an expression" (`foo();`, `foo = 1;`) by peeking at the second token:
    /// a local/global declaration is followed by another identifier.
    fn type_start_begins_decl(&mut self) -> bool {
        if matches!(self.current.kind, TokenKind::Keyword(k) if k.is_type_specifier()) {
            return true;
        }
        // identifier-as-type case: only a declaration if a second
        // identifier (the variable name) or `[]` follows.
        let save_pos = self.lexer.peek_token();
        matches!(save_pos.kind, TokenKind::Identifier(_) | TokenKind::LBracket)
    }

    fn parse_local_decl(&mut self) -> Option<Stmt> {
        let line = self.current.position.line;
        let type_name = self.parse_type();
        let name = match &self.current.kind {
            TokenKind::Identifier(n) => {
                let n = n.clone();
                self.advance();
                n
            }
            _ => {
                self.error("expected local variable name");
                return None;
            }
        };
        let initializer = if self.match_op("=") { Some(self.parse_expression()) } else { None };
        self.expect(TokenKind::Semicolon, "';'");
        Some(Stmt::LocalDecl(VariableDecl { type_name, name, initializer, line }))
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        self.advance();
        self.expect(TokenKind::LParen, "'('");
        let cond = self.parse_expression();
        self.expect(TokenKind::RParen, "')'");
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if matches!(self.current.kind, TokenKind::Keyword(Keyword::Else)) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Some(Stmt::If { cond, then_branch, else_branch })
    }

    fn parse_while(&mut self) -> Option<Stmt> {
        self.advance();
        self.expect(TokenKind::LParen, "'('");
        let cond = self.parse_expression();
        self.expect(TokenKind::RParen, "')'");
        let body = Box::new(self.parse_statement()?);
        Some(Stmt::While { cond, body })
    }

    fn parse_return(&mut self) -> Option<Stmt> {
        self.advance();
        let value = if matches!(self.current.kind, TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression())
        };
        self.expect(TokenKind::Semicolon, "';'");
        Some(Stmt::Return(value))
    }

    // ===== Expressions: assignment -> or -> and -> eq -> cmp -> add -> mul -> unary -> postfix -> primary =====

    pub fn parse_expression(&mut self) -> Expr {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Expr {
        let expr = self.parse_logical_or();
        if self.match_op("=") {
            let value = self.parse_assignment();
            return Expr::Assign { target: Box::new(expr), value: Box::new(value) };
        }
        expr
    }

    fn parse_logical_or(&mut self) -> Expr {
        let mut left = self.parse_logical_and();
        while self.match_op("||") {
            let right = self.parse_logical_and();
            left = Expr::Binary { op: BinOp::Or, left: Box::new(left), right: Box::new(right) };
        }
        left
    }

    fn parse_logical_and(&mut self) -> Expr {
        let mut left = self.parse_equality();
        while self.match_op("&&") {
            let right = self.parse_equality();
            left = Expr::Binary { op: BinOp::And, left: Box::new(left), right: Box::new(right) };
        }
        left
    }

    fn parse_equality(&mut self) -> Expr {
        let mut left = self.parse_comparison();
        loop {
            let op = if self.match_op("==") {
                BinOp::Eq
            } else if self.match_op("!=") {
                BinOp::Ne
            } else {
                break;
            };
            let right = self.parse_comparison();
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        left
    }

    fn parse_comparison(&mut self) -> Expr {
        let mut left = self.parse_bitwise();
        loop {
            let op = if self.match_op("<=") {
                BinOp::Le
            } else if self.match_op(">=") {
                BinOp::Ge
            } else if self.match_op("<") {
                BinOp::Lt
            } else if self.match_op(">") {
                BinOp::Gt
            } else {
                break;
            };
            let right = self.parse_bitwise();
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        left
    }

    fn parse_bitwise(&mut self) -> Expr {
        let mut left = self.parse_shift();
        loop {
            let op = if self.match_op("&") {
                BinOp::BitAnd
            } else if self.match_op("|") {
                BinOp::BitOr
            } else if self.match_op("^") {
                BinOp::BitXor
            } else {
                break;
            };
            let right = self.parse_shift();
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        left
    }

    fn parse_shift(&mut self) -> Expr {
        let mut left = self.parse_addition();
        loop {
            let op = if self.match_op("<<") {
                BinOp::LShift
            } else if self.match_op(">>") {
                BinOp::RShift
            } else {
                break;
            };
            let right = self.parse_addition();
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        left
    }

    fn parse_addition(&mut self) -> Expr {
        let mut left = self.parse_multiplication();
        loop {
            let op = if self.match_op("+") {
                BinOp::Add
            } else if self.match_op("-") {
                BinOp::Sub
            } else {
                break;
            };
            let right = self.parse_multiplication();
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        left
    }

    fn parse_multiplication(&mut self) -> Expr {
        let mut left = self.parse_unary();
        loop {
            let op = if self.match_op("*") {
                BinOp::Mul
            } else if self.match_op("/") {
                BinOp::Div
            } else if self.match_op("%") {
                BinOp::Mod
            } else {
                break;
            };
            let right = self.parse_unary();
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        if self.match_op("-") {
            return Expr::Unary { op: UnOp::Neg, operand: Box::new(self.parse_unary()), prefix: true };
        }
        if self.match_op("!") {
            return Expr::Unary { op: UnOp::Not, operand: Box::new(self.parse_unary()), prefix: true };
        }
        if self.match_op("~") {
            return Expr::Unary { op: UnOp::BitNot, operand: Box::new(self.parse_unary()), prefix: true };
        }
        if self.match_op("++") {
            return Expr::Unary { op: UnOp::Inc, operand: Box::new(self.parse_unary()), prefix: true };
        }
        if self.match_op("--") {
            return Expr::Unary { op: UnOp::Dec, operand: Box::new(self.parse_unary()), prefix: true };
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            if self.matches(&TokenKind::LParen) {
                let args = self.parse_arg_list();
                self.expect(TokenKind::RParen, "')'");
                expr = match expr {
                    Expr::Ident(name) => Expr::Call { callee: name, args },
                    other => {
                        self.error("expression is not callable");
                        other
                    }
                };
            } else if self.matches(&TokenKind::LBracket) {
                let index = self.parse_expression();
                self.expect(TokenKind::RBracket, "']'");
                expr = Expr::Index { base: Box::new(expr), index: Box::new(index) };
            } else if self.matches(&TokenKind::Dot) {
                let name = match &self.current.kind {
                    TokenKind::Identifier(n) => {
                        let n = n.clone();
                        self.advance();
                        n
                    }
                    _ => {
                        self.error("expected member name after '.'");
                        String::new()
                    }
                };
                if self.matches(&TokenKind::LParen) {
                    let args = self.parse_arg_list();
                    self.expect(TokenKind::RParen, "')'");
                    expr = Expr::MethodCall { object: Box::new(expr), method: name, args };
                } else {
                    self.error("bare property access is not supported by the core bytecode; call a method instead");
                }
            } else if self.match_op("++") {
                expr = Expr::Unary { op: UnOp::Inc, operand: Box::new(expr), prefix: false };
            } else if self.match_op("--") {
                expr = Expr::Unary { op: UnOp::Dec, operand: Box::new(expr), prefix: false };
            } else {
                break;
            }
        }
        expr
    }

    fn parse_arg_list(&mut self) -> Vec<Expr> {
        let mut args = Vec::new();
        if matches!(self.current.kind, TokenKind::RParen) {
            return args;
        }
        loop {
            args.push(self.parse_expression());
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        args
    }

    fn parse_primary(&mut self) -> Expr {
        match self.current.kind.clone() {
            TokenKind::IntLiteral(i) => {
                self.advance();
                Expr::IntLit(i)
            }
            TokenKind::FloatLiteral(f) => {
                self.advance();
                Expr::FloatLit(f)
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Expr::StrLit(s)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Expr::Ident(name)
            }
            TokenKind::LParen => {
                self.advance();
                // `({ ... })` array literal
                if matches!(self.current.kind, TokenKind::LBrace) {
                    self.advance();
                    let mut elements = Vec::new();
                    if !matches!(self.current.kind, TokenKind::RBrace) {
                        loop {
                            elements.push(self.parse_expression());
                            if !self.matches(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RBrace, "'}'");
                    self.expect(TokenKind::RParen, "')'");
                    return Expr::ArrayLit(elements);
                }
                // `([ ... ])` mapping literal
                if matches!(self.current.kind, TokenKind::LBracket) {
                    self.advance();
                    let mut entries = Vec::new();
                    if !matches!(self.current.kind, TokenKind::RBracket) {
                        loop {
                            let key = self.parse_expression();
                            self.expect(TokenKind::Colon, "':'");
                            let value = self.parse_expression();
                            entries.push((key, value));
                            if !self.matches(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RBracket, "']'");
                    self.expect(TokenKind::RParen, "')'");
                    return Expr::MappingLit(entries);
                }
                let expr = self.parse_expression();
                self.expect(TokenKind::RParen, "')'");
                expr
            }
            _ => {
                self.error(&format!("unexpected token '{}'", self.current.lexeme()));
                Expr::IntLit(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> (Program, Vec<ParseError>) {
        Parser::new(src).parse_program()
    }

    #[test]
    fn parses_a_function_with_arithmetic_return() {
        let (prog, errs) = parse("int test() { return 10 + 20; }");
        assert!(errs.is_empty());
        assert_eq!(prog.declarations.len(), 1);
        match &prog.declarations[0] {
            Decl::Function(f) => {
                assert_eq!(f.name, "test");
                assert_eq!(f.params.len(), 0);
                assert_eq!(f.body.len(), 1);
            }
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn parses_parameters_and_calls() {
        let (prog, errs) = parse("int add(int a, int b) { return a + b; }");
        assert!(errs.is_empty());
        match &prog.declarations[0] {
            Decl::Function(f) => {
                assert_eq!(f.params.len(), 2);
                assert_eq!(f.params[0].name, "a");
            }
            _ => panic!(),
        }
    }

    #[test]
    fn parses_global_variable_declaration() {
        let (prog, errs) = parse("int counter = 0;");
        assert!(errs.is_empty());
        assert!(matches!(&prog.declarations[0], Decl::Variable(v) if v.name == "counter"));
    }

    #[test]
    fn recovers_past_multiple_errors_in_one_pass() {
        let src = "int a( { return; } int b) ) ; int c() { return 1; }";
        let (_prog, errs) = parse(src);
        assert!(errs.len() >= 3, "expected at least 3 errors, got {}", errs.len());
    }

    #[test]
    fn parses_array_and_mapping_literals() {
        let (prog, errs) = parse("mixed test() { return ({ 1, 2, 3 }); }");
        assert!(errs.is_empty(), "{errs:?}");
        let (prog2, errs2) = parse(r#"mixed test() { return ([ "a": 1 ]); }"#);
        assert!(errs2.is_empty(), "{errs2:?}");
        let _ = prog;
        let _ = prog2;
    }

    #[test]
    fn parses_method_call_on_object_expression() {
        let (prog, errs) = parse(r#"int test(object o) { return o.greet("x"); }"#);
        assert!(errs.is_empty(), "{errs:?}");
        let _ = prog;
    }
}
