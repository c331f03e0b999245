//! Restricted arithmetic for numeric buff parameters.
//!
//! Grammar: numbers, whitelisted variables, `+ - * / %`, unary minus and
//! parentheses. Unknown identifiers fail at parse time; evaluation never
//! fails and maps non-finite results to `0`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatField {
    Hp,
    MaxHp,
    Ap,
    MaxAp,
    Speed,
}

impl StatField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "hp" => Some(Self::Hp),
            "maxHp" => Some(Self::MaxHp),
            "ap" => Some(Self::Ap),
            "maxAp" => Some(Self::MaxAp),
            "speed" => Some(Self::Speed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    DamageDealt,
    DamageTaken,
    RawDamage,
    Stacks,
    Owner(StatField),
    Target(StatField),
}

impl Variable {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "damageDealt" | "context.damageDealt" => return Some(Self::DamageDealt),
            "damageTaken" | "context.damageTaken" => return Some(Self::DamageTaken),
            "rawDamage" | "context.rawDamage" => return Some(Self::RawDamage),
            "stacks" => return Some(Self::Stacks),
            _ => {}
        }
        if let Some(field) = name
            .strip_prefix("self.stats.")
            .or_else(|| name.strip_prefix("self."))
        {
            return StatField::parse(field).map(Self::Owner);
        }
        if let Some(field) = name
            .strip_prefix("target.stats.")
            .or_else(|| name.strip_prefix("target."))
        {
            return StatField::parse(field).map(Self::Target);
        }
        StatField::parse(name).map(Self::Owner)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatValues {
    pub hp: f64,
    pub max_hp: f64,
    pub ap: f64,
    pub max_ap: f64,
    pub speed: f64,
}

impl StatValues {
    fn get(&self, field: StatField) -> f64 {
        match field {
            StatField::Hp => self.hp,
            StatField::MaxHp => self.max_hp,
            StatField::Ap => self.ap,
            StatField::MaxAp => self.max_ap,
            StatField::Speed => self.speed,
        }
    }
}

/// Variables visible to a formula.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FormulaScope {
    pub damage_dealt: f64,
    pub damage_taken: f64,
    pub raw_damage: f64,
    pub stacks: f64,
    pub owner: StatValues,
    pub target: Option<StatValues>,
}

impl FormulaScope {
    fn lookup(&self, var: Variable) -> f64 {
        match var {
            Variable::DamageDealt => self.damage_dealt,
            Variable::DamageTaken => self.damage_taken,
            Variable::RawDamage => self.raw_damage,
            Variable::Stacks => self.stacks,
            Variable::Owner(field) => self.owner.get(field),
            Variable::Target(field) => self.target.map_or(0.0, |t| t.get(field)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Var(Variable),
    Neg(Box<Expr>),
    Bin(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    fn eval(&self, scope: &FormulaScope) -> f64 {
        match self {
            Self::Num(n) => *n,
            Self::Var(var) => scope.lookup(*var),
            Self::Neg(inner) => -inner.eval(scope),
            Self::Bin(op, lhs, rhs) => {
                let (a, b) = (lhs.eval(scope), rhs.eval(scope));
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Rem => a % b,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    Open,
    Close,
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| format!("bad number '{text}'"))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '+' | '-' | '*' | '/' | '%' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

/// Deepest run of unary signs and parentheses a formula may nest.
const MAX_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, String>) -> Result<T, String> {
        if self.depth >= MAX_DEPTH {
            return Err(format!("formula nests deeper than {MAX_DEPTH} levels"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(c @ ('+' | '-'))) = self.peek() {
            let op = if *c == '+' { BinOp::Add } else { BinOp::Sub };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(c @ ('*' | '/' | '%'))) = self.peek() {
            let op = match c {
                '*' => BinOp::Mul,
                '/' => BinOp::Div,
                _ => BinOp::Rem,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.nested(Self::unary)?)))
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Expr::Num(n)),
            Some(Token::Ident(name)) => Variable::parse(&name)
                .map(Expr::Var)
                .ok_or_else(|| format!("unknown identifier '{name}'")),
            Some(Token::Open) => {
                let inner = self.nested(Self::expr)?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err("missing ')'".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected token {token:?}")),
            None => Err("unexpected end of formula".to_string()),
        }
    }
}

/// A parsed formula, ready to evaluate against any scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, String> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err("empty formula".to_string());
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.expr()?;
        if parser.pos < parser.tokens.len() {
            return Err(format!("trailing input at token {}", parser.pos));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn eval(&self, scope: &FormulaScope) -> f64 {
        let value = self.expr.eval(scope);
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
