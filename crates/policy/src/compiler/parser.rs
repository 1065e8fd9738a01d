//! Recursive-descent parser turning tokens into rule tables.

use crate::configuration::{Effect, Operation, PolicyRule, Resource, ResourceKind, RuleTables};

use super::lexer::{Spanned, Token};
use super::SyntaxError;

pub(super) struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Position reported for "unexpected end of input".
    eof: (usize, usize),
}

/// A `Kind::"value"` reference with the position of its type name.
struct EntityRef {
    kind: String,
    value: String,
    line: usize,
    column: usize,
}

impl Parser {
    pub(super) fn new(tokens: Vec<Spanned>, eof: (usize, usize)) -> Self {
        Self { tokens, pos: 0, eof }
    }

    pub(super) fn parse_policy(mut self) -> Result<RuleTables, SyntaxError> {
        let mut tables = RuleTables::default();
        while self.pos < self.tokens.len() {
            for rule in self.parse_statement()? {
                tables.push(rule);
            }
        }
        Ok(tables)
    }

    fn parse_statement(&mut self) -> Result<Vec<PolicyRule>, SyntaxError> {
        let effect = match self.next()? {
            Spanned { token: Token::Ident(ref word), .. } if word == "permit" => Effect::Permit,
            Spanned { token: Token::Ident(ref word), .. } if word == "forbid" => Effect::Forbid,
            other => {
                return Err(unexpected(&other, "`permit` or `forbid`")
                    .suggest("Every statement starts with `permit (` or `forbid (`."))
            }
        };

        self.expect(Token::LParen)?;
        self.expect_keyword("principal")?;
        self.expect(Token::Comma)?;

        self.expect_keyword("action")?;
        let actions = self.parse_constraint()?;
        let operations = actions
            .into_iter()
            .map(resolve_action)
            .collect::<Result<Vec<_>, _>>()?;
        self.expect(Token::Comma)?;

        let scope = self.expect_keyword("resource")?;
        let mut resources = if self.peek_is(&Token::RParen) {
            Vec::new()
        } else {
            self.parse_constraint()?
        };
        self.expect(Token::RParen)?;

        if self.peek_keyword("when") {
            let when = self.next()?;
            if !resources.is_empty() {
                return Err(SyntaxError::new(
                    when.line,
                    when.column,
                    "resource is constrained in both the scope and the `when` clause",
                )
                .suggest("Constrain the resource in one place only."));
            }
            self.expect(Token::LBrace)?;
            self.expect_keyword("resource")?;
            resources = self.parse_constraint()?;
            self.expect(Token::RBrace)?;
        }
        self.expect(Token::Semi)?;

        if resources.is_empty() {
            return Err(SyntaxError::new(scope.line, scope.column, "statement does not constrain `resource`")
                .suggest("Add `resource in [ Dir::\"/path\" ]` or a `when { resource in [...] }` clause."));
        }

        let mut rules = Vec::with_capacity(operations.len() * resources.len());
        for entity in resources {
            let kind = ResourceKind::from_type_name(&entity.kind).ok_or_else(|| {
                SyntaxError::new(
                    entity.line,
                    entity.column,
                    format!("unknown resource type `{}`", entity.kind),
                )
                .suggest("Resources are Dir::\"...\", File::\"...\" or Host::\"...\".")
            })?;
            if entity.value.trim().is_empty() {
                return Err(SyntaxError::new(entity.line, entity.column, "resource value must not be empty"));
            }
            for &operation in &operations {
                if !operation.accepts(kind) {
                    return Err(SyntaxError::new(
                        entity.line,
                        entity.column,
                        format!(
                            "Action::{:?} cannot apply to {} resources",
                            operation.action_id(),
                            kind.type_name()
                        ),
                    )
                    .suggest("File and exec actions take Dir/File resources; NetworkConnect takes Host."));
                }
                rules.push(PolicyRule {
                    effect,
                    operation,
                    resource: Resource {
                        kind,
                        value: entity.value.clone(),
                    },
                });
            }
        }
        Ok(rules)
    }

    /// `== Entity` | `in Entity` | `in [ Entity, ... ]`
    fn parse_constraint(&mut self) -> Result<Vec<EntityRef>, SyntaxError> {
        let op = self.next()?;
        match op.token {
            Token::EqEq => Ok(vec![self.parse_entity()?]),
            Token::Ident(ref word) if word == "in" => {
                if self.peek_is(&Token::LBracket) {
                    self.parse_entity_list()
                } else {
                    Ok(vec![self.parse_entity()?])
                }
            }
            _ => Err(unexpected(&op, "`==` or `in`")),
        }
    }

    fn parse_entity_list(&mut self) -> Result<Vec<EntityRef>, SyntaxError> {
        self.expect(Token::LBracket)?;
        let mut entities = Vec::new();
        loop {
            entities.push(self.parse_entity()?);
            let sep = self.next()?;
            match sep.token {
                Token::Comma => continue,
                Token::RBracket => break,
                _ => return Err(unexpected(&sep, "`,` or `]`")),
            }
        }
        Ok(entities)
    }

    fn parse_entity(&mut self) -> Result<EntityRef, SyntaxError> {
        let head = self.next()?;
        let kind = match head.token {
            Token::Ident(ref name) => name.clone(),
            _ => return Err(unexpected(&head, "an entity type such as `Dir`")),
        };
        self.expect(Token::PathSep)?;
        let value_tok = self.next()?;
        let value = match value_tok.token {
            Token::Str(ref value) => value.clone(),
            _ => return Err(unexpected(&value_tok, "a quoted entity id")),
        };
        Ok(EntityRef {
            kind,
            value,
            line: head.line,
            column: head.column,
        })
    }

    fn next(&mut self) -> Result<Spanned, SyntaxError> {
        match self.tokens.get(self.pos) {
            Some(tok) => {
                self.pos += 1;
                Ok(tok.clone())
            }
            None => Err(SyntaxError::new(self.eof.0, self.eof.1, "unexpected end of policy")
                .suggest("Check for a missing `)` or `;` at the end of the last statement.")),
        }
    }

    fn peek_is(&self, token: &Token) -> bool {
        self.tokens.get(self.pos).is_some_and(|t| &t.token == token)
    }

    fn peek_keyword(&self, word: &str) -> bool {
        matches!(self.tokens.get(self.pos), Some(Spanned { token: Token::Ident(w), .. }) if w == word)
    }

    fn expect(&mut self, token: Token) -> Result<Spanned, SyntaxError> {
        let got = self.next()?;
        if got.token == token {
            Ok(got)
        } else {
            Err(unexpected(&got, &token.describe()))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<Spanned, SyntaxError> {
        let got = self.next()?;
        match got.token {
            Token::Ident(ref w) if w == word => Ok(got),
            _ => Err(unexpected(&got, &format!("`{word}`"))),
        }
    }
}

fn resolve_action(entity: EntityRef) -> Result<Operation, SyntaxError> {
    if entity.kind != "Action" {
        return Err(SyntaxError::new(
            entity.line,
            entity.column,
            format!("expected an `Action` entity, found `{}`", entity.kind),
        ));
    }
    Operation::from_action_id(&entity.value).ok_or_else(|| {
        let known: Vec<&str> = Operation::ALL.iter().map(|op| op.action_id()).collect();
        SyntaxError::new(
            entity.line,
            entity.column,
            format!("unknown action {:?}", entity.value),
        )
        .suggest(format!("Known actions: {}.", known.join(", ")))
    })
}

fn unexpected(got: &Spanned, expected: &str) -> SyntaxError {
    SyntaxError::new(
        got.line,
        got.column,
        format!("expected {expected}, found {}", got.token.describe()),
    )
}
