//! Compile-time evaluation of constant expressions.
//!
//! Operands arrive already converted to the operator's parameter types;
//! integer arithmetic wraps the way the target machine does. Integral
//! division by zero is not a constant expression and yields `None`.

use cinder_ast::{BinOp, UnOp};
use cinder_symtab::{Constant, Prim, Type};

pub fn fold_unary(op: UnOp, c: &Constant, result: Prim) -> Option<Constant> {
    let c = c.coerce(result)?;
    Some(match (op, c) {
        (UnOp::Pos, c) => c,
        (UnOp::Neg, Constant::Int(v)) => Constant::Int(v.wrapping_neg()),
        (UnOp::Neg, Constant::Long(v)) => Constant::Long(v.wrapping_neg()),
        (UnOp::Neg, Constant::Float(v)) => Constant::Float(-v),
        (UnOp::Neg, Constant::Double(v)) => Constant::Double(-v),
        (UnOp::Compl, Constant::Int(v)) => Constant::Int(!v),
        (UnOp::Compl, Constant::Long(v)) => Constant::Long(!v),
        (UnOp::Not, Constant::Bool(b)) => Constant::Bool(!b),
        _ => return None,
    })
}

/// Fold `l op r`. `left` and `right` are the operator's parameter types
/// and `result` its return type.
pub fn fold_binary(op: BinOp, l: &Constant, r: &Constant, left: &Type, right: &Type, result: &Type) -> Option<Constant> {
    if !result.is_prim() {
        return match op {
            BinOp::Add => Some(Constant::Str(format!("{}{}", l.stringify(), r.stringify()))),
            _ => None,
        };
    }
    match op {
        BinOp::Shl | BinOp::Shr | BinOp::Ushr => {
            let amount = r.coerce(right.prim()?)?.as_i64()?;
            return fold_shift(op, &l.coerce(left.prim()?)?, amount);
        }
        _ => {}
    }
    let p = left.prim()?;
    let (l, r) = (l.coerce(p)?, r.coerce(p)?);
    match (l, r) {
        (Constant::Int(a), Constant::Int(b)) => fold_int(op, a, b),
        (Constant::Long(a), Constant::Long(b)) => fold_long(op, a, b),
        (Constant::Float(a), Constant::Float(b)) => fold_float(op, a as f64, b as f64).map(|c| match c {
            Constant::Double(v) => Constant::Float(v as f32),
            other => other,
        }),
        (Constant::Double(a), Constant::Double(b)) => fold_float(op, a, b),
        (Constant::Char(a), Constant::Char(b)) => fold_int(op, a as i32, b as i32),
        (Constant::Bool(a), Constant::Bool(b)) => fold_bool(op, a, b),
        _ => None,
    }
}

fn fold_int(op: BinOp, a: i32, b: i32) -> Option<Constant> {
    use BinOp::*;
    Some(match op {
        Add => Constant::Int(a.wrapping_add(b)),
        Sub => Constant::Int(a.wrapping_sub(b)),
        Mul => Constant::Int(a.wrapping_mul(b)),
        Div if b == 0 => return None,
        Div => Constant::Int(a.wrapping_div(b)),
        Mod if b == 0 => return None,
        Mod => Constant::Int(a.wrapping_rem(b)),
        BitAnd => Constant::Int(a & b),
        BitOr => Constant::Int(a | b),
        BitXor => Constant::Int(a ^ b),
        Eq => Constant::Bool(a == b),
        Ne => Constant::Bool(a != b),
        Lt => Constant::Bool(a < b),
        Gt => Constant::Bool(a > b),
        Le => Constant::Bool(a <= b),
        Ge => Constant::Bool(a >= b),
        _ => return None,
    })
}

fn fold_long(op: BinOp, a: i64, b: i64) -> Option<Constant> {
    use BinOp::*;
    Some(match op {
        Add => Constant::Long(a.wrapping_add(b)),
        Sub => Constant::Long(a.wrapping_sub(b)),
        Mul => Constant::Long(a.wrapping_mul(b)),
        Div if b == 0 => return None,
        Div => Constant::Long(a.wrapping_div(b)),
        Mod if b == 0 => return None,
        Mod => Constant::Long(a.wrapping_rem(b)),
        BitAnd => Constant::Long(a & b),
        BitOr => Constant::Long(a | b),
        BitXor => Constant::Long(a ^ b),
        Eq => Constant::Bool(a == b),
        Ne => Constant::Bool(a != b),
        Lt => Constant::Bool(a < b),
        Gt => Constant::Bool(a > b),
        Le => Constant::Bool(a <= b),
        Ge => Constant::Bool(a >= b),
        _ => return None,
    })
}

fn fold_float(op: BinOp, a: f64, b: f64) -> Option<Constant> {
    use BinOp::*;
    Some(match op {
        Add => Constant::Double(a + b),
        Sub => Constant::Double(a - b),
        Mul => Constant::Double(a * b),
        Div => Constant::Double(a / b),
        Mod => Constant::Double(a % b),
        Eq => Constant::Bool(a == b),
        Ne => Constant::Bool(a != b),
        Lt => Constant::Bool(a < b),
        Gt => Constant::Bool(a > b),
        Le => Constant::Bool(a <= b),
        Ge => Constant::Bool(a >= b),
        _ => return None,
    })
}

fn fold_bool(op: BinOp, a: bool, b: bool) -> Option<Constant> {
    use BinOp::*;
    Some(Constant::Bool(match op {
        And | BitAnd => a && b,
        Or | BitOr => a || b,
        BitXor | Ne => a != b,
        Eq => a == b,
        _ => return None,
    }))
}

fn fold_shift(op: BinOp, l: &Constant, amount: i64) -> Option<Constant> {
    Some(match *l {
        Constant::Int(v) => {
            let n = (amount & 31) as u32;
            Constant::Int(match op {
                BinOp::Shl => v.wrapping_shl(n),
                BinOp::Shr => v.wrapping_shr(n),
                _ => ((v as u32) >> n) as i32,
            })
        }
        Constant::Long(v) => {
            let n = (amount & 63) as u32;
            Constant::Long(match op {
                BinOp::Shl => v.wrapping_shl(n),
                BinOp::Shr => v.wrapping_shr(n),
                _ => ((v as u64) >> n) as i64,
            })
        }
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Type {
        Type::Prim(Prim::Int)
    }

    #[test]
    fn integer_arithmetic_wraps() {
        let max = Constant::Int(i32::MAX);
        let one = Constant::Int(1);
        assert_eq!(fold_binary(BinOp::Add, &max, &one, &int(), &int(), &int()), Some(Constant::Int(i32::MIN)));
        assert_eq!(fold_unary(UnOp::Neg, &Constant::Int(i32::MIN), Prim::Int), Some(Constant::Int(i32::MIN)));
    }

    #[test]
    fn integral_division_by_zero_is_not_constant() {
        let z = Constant::Int(0);
        assert_eq!(fold_binary(BinOp::Div, &Constant::Int(4), &z, &int(), &int(), &int()), None);
        assert_eq!(fold_binary(BinOp::Mod, &Constant::Int(4), &z, &int(), &int(), &int()), None);
        let d = Type::Prim(Prim::Double);
        let inf = fold_binary(BinOp::Div, &Constant::Double(1.0), &Constant::Double(0.0), &d, &d, &d);
        assert_eq!(inf, Some(Constant::Double(f64::INFINITY)));
    }

    #[test]
    fn chars_promote_before_arithmetic() {
        let r = fold_binary(BinOp::Add, &Constant::Char('a' as u16), &Constant::Int(1), &int(), &int(), &int());
        assert_eq!(r, Some(Constant::Int(98)));
    }

    #[test]
    fn unsigned_shift_of_negative_int() {
        let r = fold_binary(BinOp::Ushr, &Constant::Int(-1), &Constant::Int(28), &int(), &int(), &int());
        assert_eq!(r, Some(Constant::Int(15)));
        let r = fold_binary(BinOp::Shl, &Constant::Int(1), &Constant::Int(33), &int(), &int(), &int());
        assert_eq!(r, Some(Constant::Int(2)));
    }

    #[test]
    fn string_concatenation_uses_java_rendering() {
        let r = fold_binary(
            BinOp::Add,
            &Constant::Str("x=".into()),
            &Constant::Double(1.0),
            &Type::Error,
            &Type::Prim(Prim::Double),
            &Type::Error,
        );
        assert_eq!(r, Some(Constant::Str("x=1.0".into())));
    }

    #[test]
    fn boolean_logic() {
        let b = Type::boolean();
        let r = fold_binary(BinOp::And, &Constant::Bool(true), &Constant::Bool(false), &b, &b, &b);
        assert_eq!(r, Some(Constant::Bool(false)));
        assert_eq!(fold_unary(UnOp::Not, &Constant::Bool(false), Prim::Boolean), Some(Constant::Bool(true)));
    }
}
