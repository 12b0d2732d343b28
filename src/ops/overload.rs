//! Arithmetic operators for [`Value`].
//!
//! Every combination of owned and borrowed operands is covered, as well as
//! `Value op f64` and `f64 op Value`. Operators panic on incompatible shapes;
//! use the `try_*` methods on [`Value`] to get an error instead.

use core::ops::{Add, Div, Mul, Neg, Sub};

use crate::tensors::Tensor;
use crate::value::Value;

macro_rules! impl_value_binop {
    ($trait:ident, $method:ident) => {
        impl $trait<&Value> for &Value {
            type Output = Value;
            fn $method(self, rhs: &Value) -> Value {
                Value::$method(self, rhs)
            }
        }

        impl $trait<Value> for &Value {
            type Output = Value;
            fn $method(self, rhs: Value) -> Value {
                Value::$method(self, &rhs)
            }
        }

        impl $trait<&Value> for Value {
            type Output = Value;
            fn $method(self, rhs: &Value) -> Value {
                Value::$method(&self, rhs)
            }
        }

        impl $trait<Value> for Value {
            type Output = Value;
            fn $method(self, rhs: Value) -> Value {
                Value::$method(&self, &rhs)
            }
        }
    };
}

impl_value_binop!(Add, add);
impl_value_binop!(Sub, sub);
impl_value_binop!(Mul, mul);
impl_value_binop!(Div, div);

macro_rules! impl_scalar_binop {
    ($trait:ident, $method:ident, |$v:ident, $c:ident| $body:expr) => {
        impl $trait<f64> for &Value {
            type Output = Value;
            fn $method(self, $c: f64) -> Value {
                let $v = self;
                $body
            }
        }

        impl $trait<f64> for Value {
            type Output = Value;
            fn $method(self, $c: f64) -> Value {
                let $v = &self;
                $body
            }
        }
    };
}

impl_scalar_binop!(Add, add, |v, c| v.add_scalar(c));
impl_scalar_binop!(Sub, sub, |v, c| v.add_scalar(-c));
impl_scalar_binop!(Mul, mul, |v, c| v.mul_scalar(c));
impl_scalar_binop!(Div, div, |v, c| v.mul_scalar(1.0 / c));

impl Add<&Value> for f64 {
    type Output = Value;
    fn add(self, rhs: &Value) -> Value {
        rhs.add_scalar(self)
    }
}

impl Add<Value> for f64 {
    type Output = Value;
    fn add(self, rhs: Value) -> Value {
        rhs.add_scalar(self)
    }
}

impl Mul<&Value> for f64 {
    type Output = Value;
    fn mul(self, rhs: &Value) -> Value {
        rhs.mul_scalar(self)
    }
}

impl Mul<Value> for f64 {
    type Output = Value;
    fn mul(self, rhs: Value) -> Value {
        rhs.mul_scalar(self)
    }
}

impl Sub<&Value> for f64 {
    type Output = Value;
    fn sub(self, rhs: &Value) -> Value {
        rhs.neg().add_scalar(self)
    }
}

impl Sub<Value> for f64 {
    type Output = Value;
    fn sub(self, rhs: Value) -> Value {
        rhs.neg().add_scalar(self)
    }
}

impl Div<&Value> for f64 {
    type Output = Value;
    fn div(self, rhs: &Value) -> Value {
        Value::div(&Value::constant(Tensor::scalar(self)), rhs)
    }
}

impl Div<Value> for f64 {
    type Output = Value;
    fn div(self, rhs: Value) -> Value {
        Value::div(&Value::constant(Tensor::scalar(self)), &rhs)
    }
}

impl Neg for &Value {
    type Output = Value;
    fn neg(self) -> Value {
        Value::neg(self)
    }
}

impl Neg for Value {
    type Output = Value;
    fn neg(self) -> Value {
        Value::neg(&self)
    }
}
