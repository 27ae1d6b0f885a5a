//! Business rules layered on a decoded payload
//!
//! The codec only answers "authentic and fresh". Whether the payload makes
//! sense is the caller's call; a failed [`Rule`] turns a valid outcome into an
//! invalid one via [`Outcome::enforce`](crate::Outcome::enforce).

use serde_json::Value;

pub trait Rule {
    /// Ok, or a human-readable reason
    fn check(&self, data: &Value) -> Result<(), String>;

    /// Run `other` after this rule passes
    fn then<R>(self, other: R) -> Then<Self, R>
    where
        Self: Sized,
        R: Rule,
    {
        Then(self, other)
    }
}

pub struct Then<A, B>(A, B);

impl<A: Rule, B: Rule> Rule for Then<A, B> {
    fn check(&self, data: &Value) -> Result<(), String> {
        self.0.check(data)?;
        self.1.check(data)
    }
}

/// Rule backed by a closure
pub struct FromFn<F>(F);

pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: Fn(&Value) -> Result<(), String>,
{
    FromFn(f)
}

impl<F> Rule for FromFn<F>
where
    F: Fn(&Value) -> Result<(), String>,
{
    fn check(&self, data: &Value) -> Result<(), String> {
        (self.0)(data)
    }
}

impl<R: Rule> Rule for [R] {
    fn check(&self, data: &Value) -> Result<(), String> {
        self.iter().try_for_each(|rule| rule.check(data))
    }
}

impl<R: Rule> Rule for Vec<R> {
    fn check(&self, data: &Value) -> Result<(), String> {
        self.as_slice().check(data)
    }
}

impl<R: Rule + ?Sized> Rule for Box<R> {
    fn check(&self, data: &Value) -> Result<(), String> {
        (**self).check(data)
    }
}

/// Top-level fields that must be present and non-null
#[derive(Debug, Clone)]
pub struct RequiredFields(Vec<String>);

impl RequiredFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(Into::into).collect())
    }
}

impl Rule for RequiredFields {
    fn check(&self, data: &Value) -> Result<(), String> {
        let object = data
            .as_object()
            .ok_or_else(|| "payload is not an object".to_string())?;
        match self
            .0
            .iter()
            .find(|field| object.get(field.as_str()).map_or(true, Value::is_null))
        {
            Some(missing) => Err(format!("missing required field `{missing}`")),
            None => Ok(()),
        }
    }
}

/// Inclusive numeric bounds on one top-level field
#[derive(Debug, Clone)]
pub struct NumericRange {
    field: String,
    min: Option<f64>,
    max: Option<f64>,
}

impl NumericRange {
    pub fn between(field: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            field: field.into(),
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_least(field: impl Into<String>, min: f64) -> Self {
        Self {
            field: field.into(),
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(field: impl Into<String>, max: f64) -> Self {
        Self {
            field: field.into(),
            min: None,
            max: Some(max),
        }
    }
}

impl Rule for NumericRange {
    fn check(&self, data: &Value) -> Result<(), String> {
        let field = &self.field;
        let value = data
            .get(field.as_str())
            .ok_or_else(|| format!("missing required field `{field}`"))?;
        let n = value
            .as_f64()
            .ok_or_else(|| format!("field `{field}` is not a number"))?;

        if self.min.is_some_and(|min| n < min) || self.max.is_some_and(|max| n > max) {
            let lo = self.min.map_or("-inf".to_string(), |m| m.to_string());
            let hi = self.max.map_or("inf".to_string(), |m| m.to_string());
            return Err(format!("field `{field}` = {n} is outside [{lo}, {hi}]"));
        }
        Ok(())
    }
}
