//! Named symbol vectors, the expression language over them, and cleanup memory.
//!
//! Expressions combine names with `+` / `-` (superposition, lowest precedence,
//! left to right), `*` (bind) and prefix `~` (inverse, highest). Parentheses
//! group. Whitespace is ignored.

use hashbrown::HashMap;
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::prng::Prng;
use crate::spectrum;
use crate::vector::Vector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Freshly generated (or explicitly inserted) symbol.
    Atom,
    /// Compound key recorded for cleanup, e.g. a row×column cell identity.
    Pair,
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    kind: KeyKind,
    vector: Vector,
}

/// Symbol table plus associative cleanup memory.
///
/// Keys are unique and enumerate in registration order; every arg-max in the
/// engine breaks ties toward the earliest key.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    dimension: usize,
    cleanup_threshold: f64,
    max_similarity: f64,
    max_attempts: u32,
    unitary: bool,

    rng: Prng,

    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn new(cfg: &EngineConfig) -> Result<Self> {
        cfg.validate().map_err(Error::InvalidConfig)?;
        Ok(Self {
            dimension: cfg.dimension,
            cleanup_threshold: cfg.cleanup_threshold,
            max_similarity: cfg.max_similarity,
            max_attempts: cfg.max_attempts,
            unitary: cfg.unitary_atoms,
            rng: Prng::new(cfg.effective_seed()),
            entries: Vec::new(),
            index: HashMap::new(),
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Threshold used by callers that do not pass their own.
    #[inline]
    pub fn cleanup_threshold(&self) -> f64 {
        self.cleanup_threshold
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn zero(&self) -> Vector {
        Vector::zero(self.dimension)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn kind(&self, name: &str) -> Option<KeyKind> {
        self.index.get(name).map(|&i| self.entries[i].kind)
    }

    pub fn vector(&self, name: &str) -> Option<&Vector> {
        self.index.get(name).map(|&i| &self.entries[i].vector)
    }

    /// All keys, atoms and pairs, in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn pair_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(|e| e.kind == KeyKind::Pair)
            .map(|e| e.name.as_str())
    }

    /// Vector for `name`, generating a new atom the first time it is seen.
    pub fn atom(&mut self, name: &str) -> Vector {
        if let Some(v) = self.vector(name) {
            return v.clone();
        }
        let vector = self.generate(name);
        self.push(name, KeyKind::Atom, vector.clone());
        vector
    }

    /// Store an explicit vector as an atom, replacing any previous value.
    pub fn insert_atom(&mut self, name: &str, vector: Vector) -> Result<()> {
        self.insert(name, KeyKind::Atom, vector)
    }

    /// Record `name` (itself an expression such as `R1*C1`) as a compound
    /// key. Its constituents become atoms if needed; no new random vector is
    /// drawn for the pair itself.
    pub fn register_pair(&mut self, name: &str) -> Result<Vector> {
        if let Some(v) = self.vector(name) {
            return Ok(v.clone());
        }
        let vector = self.parse(name)?;
        self.push(name, KeyKind::Pair, vector.clone());
        Ok(vector)
    }

    /// Record a compound key with an explicit vector.
    pub fn register_pair_with(&mut self, name: &str, vector: Vector) -> Result<()> {
        self.insert(name, KeyKind::Pair, vector)
    }

    /// Evaluate an expression, creating atoms for unseen names.
    ///
    /// A malformed expression fails before any atom is created.
    pub fn parse(&mut self, expression: &str) -> Result<Vector> {
        let ast = parse_expression(expression)?;
        eval(&ast, &mut |name| Ok(self.atom(name)))
    }

    /// Evaluate an expression over existing keys only.
    pub fn evaluate(&self, expression: &str) -> Result<Vector> {
        let ast = parse_expression(expression)?;
        eval(&ast, &mut |name| {
            self.vector(name)
                .cloned()
                .ok_or_else(|| Error::UnknownSymbol(name.to_string()))
        })
    }

    /// Dot product of `query` with every key, in registration order.
    pub fn dot_all(&self, query: &Vector) -> Result<Vec<f64>> {
        self.check(query)?;

        #[cfg(feature = "parallel")]
        let out = self
            .entries
            .par_iter()
            .map(|e| e.vector.dot(query))
            .collect::<Result<Vec<f64>>>();

        #[cfg(not(feature = "parallel"))]
        let out = self
            .entries
            .iter()
            .map(|e| e.vector.dot(query))
            .collect::<Result<Vec<f64>>>();

        out
    }

    /// Dot product of `query` with every pair key, aligned with `pair_keys()`.
    pub fn dot_pairs(&self, query: &Vector) -> Result<Vec<f64>> {
        self.check(query)?;
        self.entries
            .iter()
            .filter(|e| e.kind == KeyKind::Pair)
            .map(|e| e.vector.dot(query))
            .collect()
    }

    /// Every key whose similarity with `query` is strictly above `threshold`.
    pub fn cleanup(&self, query: &Vector, threshold: f64) -> Result<Vec<&str>> {
        let sims = self.dot_all(query)?;
        Ok(self
            .entries
            .iter()
            .zip(sims)
            .filter(|(_, s)| *s > threshold)
            .map(|(e, _)| e.name.as_str())
            .collect())
    }

    /// Normalized superposition of every cleanup match; the zero vector when
    /// nothing clears the threshold.
    pub fn recall(&self, query: &Vector, threshold: f64) -> Result<Vector> {
        let matched = self.cleanup(query, threshold)?;
        let mut acc = self.zero();
        for name in matched {
            if let Some(v) = self.vector(name) {
                acc = acc.add(v)?;
            }
        }
        Ok(acc.normalize())
    }

    /// Single best key for `query`; `None` only when the vocabulary is empty.
    pub fn nearest_key(&self, query: &Vector) -> Result<Option<(&str, f64)>> {
        let sims = self.dot_all(query)?;
        Ok(arg_max(&sims).map(|i| (self.entries[i].name.as_str(), sims[i])))
    }

    /// Best pair key for `query`; `None` when no pair is registered.
    pub fn nearest_pair(&self, query: &Vector) -> Result<Option<(&str, f64)>> {
        let sims = self.dot_pairs(query)?;
        Ok(arg_max(&sims).and_then(|i| self.pair_keys().nth(i).map(|name| (name, sims[i]))))
    }

    fn check(&self, v: &Vector) -> Result<()> {
        if v.dimension() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                found: v.dimension(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, name: &str, kind: KeyKind, vector: Vector) -> Result<()> {
        self.check(&vector)?;
        if let Some(&i) = self.index.get(name) {
            self.entries[i].kind = kind;
            self.entries[i].vector = vector;
        } else {
            self.push(name, kind, vector);
        }
        Ok(())
    }

    fn push(&mut self, name: &str, kind: KeyKind, vector: Vector) {
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push(Entry {
            name: name.to_string(),
            kind,
            vector,
        });
    }

    /// Draw a fresh atom that is near-orthogonal to every existing atom.
    fn generate(&mut self, name: &str) -> Vector {
        let mut best: Option<(Vector, f64)> = None;

        for _ in 0..self.max_attempts {
            let candidate = self.random_vector();
            let worst = self
                .entries
                .iter()
                .filter(|e| e.kind == KeyKind::Atom)
                .filter_map(|e| e.vector.dot(&candidate).ok())
                .fold(0.0f64, |acc, s| acc.max(s.abs()));

            if worst < self.max_similarity {
                debug!(name, similarity = worst, "created atom");
                return candidate;
            }
            if best.as_ref().map(|b| worst < b.1).unwrap_or(true) {
                best = Some((candidate, worst));
            }
        }

        // max_attempts > 0 is enforced by config validation.
        let (vector, worst) = best.unwrap_or_else(|| (self.random_vector(), f64::NAN));
        warn!(
            name,
            similarity = worst,
            attempts = self.max_attempts,
            "no atom under max_similarity; keeping the least similar candidate"
        );
        vector
    }

    fn random_vector(&mut self) -> Vector {
        let scale = 1.0 / (self.dimension as f64).sqrt();
        let raw: Vec<f64> = (0..self.dimension)
            .map(|_| self.rng.next_gaussian() * scale)
            .collect();
        if self.unitary {
            Vector::from_vec(spectrum::make_unitary(&raw))
        } else {
            Vector::from_vec(raw).normalize()
        }
    }
}

/// Index of the first maximal element.
fn arg_max(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        if best.map(|b| v > values[b]).unwrap_or(true) {
            best = Some(i);
        }
    }
    best
}

// =========================================================================
// Expression language
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Plus,
    Minus,
    Star,
    Tilde,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Symbol(String),
    Inverse(Box<Expr>),
    Bind(Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
}

fn tokenize(src: &str) -> Result<Vec<(usize, Token)>> {
    let mut out = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        let tok = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '~' => Token::Tilde,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push((pos, Token::Ident(name)));
                continue;
            }
            other => {
                return Err(Error::parse(pos, format!("unexpected character `{other}`")));
            }
        };
        chars.next();
        out.push((pos, tok));
    }

    Ok(out)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

fn parse_expression(src: &str) -> Result<Expr> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(Error::parse(0, "empty expression"));
    }
    let mut p = Parser {
        tokens,
        pos: 0,
        end: src.len(),
    };
    let expr = p.sum()?;
    if let Some((at, tok)) = p.tokens.get(p.pos) {
        let message = match tok {
            Token::RParen => "unbalanced `)`".to_string(),
            _ => format!("expected operator, found {tok:?}"),
        };
        return Err(Error::parse(*at, message));
    }
    Ok(expr)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn here(&self) -> usize {
        self.tokens.get(self.pos).map(|(at, _)| *at).unwrap_or(self.end)
    }

    fn sum(&mut self) -> Result<Expr> {
        let mut lhs = self.product()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    let rhs = self.product()?;
                    lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    let rhs = self.product()?;
                    lhs = Expr::Sub(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn product(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some(Token::Star) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Bind(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        if let Some(Token::Tilde) = self.peek() {
            self.pos += 1;
            let inner = self.unary()?;
            return Ok(Expr::Inverse(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        let at = self.here();
        match self.tokens.get(self.pos).map(|(_, t)| t.clone()) {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(Expr::Symbol(name))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.sum()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(Error::parse(at, "unbalanced `(`")),
                }
            }
            Some(tok) => Err(Error::parse(at, format!("expected operand, found {tok:?}"))),
            None => Err(Error::parse(at, "empty operand")),
        }
    }
}

fn eval(expr: &Expr, lookup: &mut dyn FnMut(&str) -> Result<Vector>) -> Result<Vector> {
    match expr {
        Expr::Symbol(name) => lookup(name),
        Expr::Inverse(inner) => Ok(eval(inner, lookup)?.inverse()),
        Expr::Bind(a, b) => {
            let a = eval(a, lookup)?;
            a.bind(&eval(b, lookup)?)
        }
        Expr::Add(a, b) => {
            let a = eval(a, lookup)?;
            a.add(&eval(b, lookup)?)
        }
        Expr::Sub(a, b) => {
            let a = eval(a, lookup)?;
            a.sub(&eval(b, lookup)?)
        }
    }
}
