//! Shared fixtures: hand-lowered units for the end-to-end fold scenarios.

#![allow(dead_code)]

use enumflags2::BitFlags;
use rtlc_eval::ir::build::UnitBuilder;
use rtlc_eval::ir::{CmpOp, Op, Unit, VarRef, WrapDim};
use rtlc_eval::{EvalFlag, Expr, Session, Span, Type};

pub fn base_flags() -> BitFlags<EvalFlag> {
    EvalFlag::FnCall | EvalFlag::Bounds | EvalFlag::Warn
}

pub fn int_ty() -> Type {
    Type::universal_int()
}

pub fn int_lit(value: i64) -> Expr {
    Expr::IntLit {
        value,
        ty: int_ty(),
        span: Span::default(),
    }
}

pub fn str_lit(value: &str) -> Expr {
    Expr::StrLit {
        value: value.to_string(),
        ty: Type::string(),
        span: Span::default(),
    }
}

pub fn call(name: &str, args: Vec<Expr>, ty: Type) -> Expr {
    Expr::FnCall {
        name: name.to_string(),
        args,
        ty,
        pure: true,
        span: Span::default(),
    }
}

pub fn session_with(units: Vec<Unit>) -> Session {
    let mut session = Session::new();
    for unit in units {
        session.units.insert(unit);
    }
    session
}

/// Unwrap a folded integer literal.
pub fn as_int(expr: &Expr) -> i64 {
    match expr {
        Expr::IntLit { value, .. } => *value,
        other => panic!("expected integer literal, got {:?}", other),
    }
}

/// Unwrap a folded real literal.
pub fn as_real(expr: &Expr) -> f64 {
    match expr {
        Expr::RealLit { value, .. } => *value,
        other => panic!("expected real literal, got {:?}", other),
    }
}

/// Unwrap a folded enumeration literal position.
pub fn as_enum(expr: &Expr) -> i64 {
    match expr {
        Expr::EnumLit { index, .. } => *index,
        other => panic!("expected enum literal, got {:?}", other),
    }
}

/// `add1(x) = x + 1`
pub fn add1_unit() -> Unit {
    let mut b = UnitBuilder::function("work.add1", false).result(int_ty());
    let x = b.reg();
    let one = b.const_int(1);
    let sum = b.reg();
    b.push(Op::Add {
        dest: sum,
        lhs: x,
        rhs: one,
    });
    b.push(Op::Return { src: Some(sum) });
    b.finish()
}

/// Iterative doubling: `n := 0; i := 1; while i < x loop i := i * 2;
/// n := n + 1; end loop; return n`
pub fn log2_unit() -> Unit {
    let mut b = UnitBuilder::function("work.log2", false).result(int_ty());
    let x = b.reg();
    let n = b.var("n", int_ty());
    let i = b.var("i", int_ty());

    let zero = b.const_int(0);
    let one = b.const_int(1);
    let two = b.const_int(2);
    b.push(Op::Store {
        var: VarRef { depth: 0, index: n },
        src: zero,
    });
    b.push(Op::Store {
        var: VarRef { depth: 0, index: i },
        src: one,
    });
    let test = b.block();
    let body = b.block();
    let exit = b.block();
    b.push(Op::Jump { target: test });

    b.select(test);
    let iv = b.reg();
    b.push(Op::Load {
        dest: iv,
        var: VarRef { depth: 0, index: i },
    });
    let c = b.reg();
    b.push(Op::Cmp {
        dest: c,
        op: CmpOp::Lt,
        lhs: iv,
        rhs: x,
    });
    b.push(Op::Cond {
        test: c,
        if_true: body,
        if_false: exit,
    });

    b.select(body);
    let iv2 = b.reg();
    b.push(Op::Load {
        dest: iv2,
        var: VarRef { depth: 0, index: i },
    });
    let doubled = b.reg();
    b.push(Op::Mul {
        dest: doubled,
        lhs: iv2,
        rhs: two,
    });
    b.push(Op::Store {
        var: VarRef { depth: 0, index: i },
        src: doubled,
    });
    let nv = b.reg();
    b.push(Op::Load {
        dest: nv,
        var: VarRef { depth: 0, index: n },
    });
    let bumped = b.reg();
    b.push(Op::Add {
        dest: bumped,
        lhs: nv,
        rhs: one,
    });
    b.push(Op::Store {
        var: VarRef { depth: 0, index: n },
        src: bumped,
    });
    b.push(Op::Jump { target: test });

    b.select(exit);
    let result = b.reg();
    b.push(Op::Load {
        dest: result,
        var: VarRef { depth: 0, index: n },
    });
    b.push(Op::Return { src: Some(result) });
    b.finish()
}

/// `case1(x)`: 2 for 1, 3 for 2, else 5.
pub fn case1_unit() -> Unit {
    let mut b = UnitBuilder::function("work.case1", false).result(int_ty());
    let x = b.reg();
    let when1 = b.block();
    let when2 = b.block();
    let others = b.block();
    b.push(Op::Case {
        value: x,
        branches: vec![(1, when1), (2, when2)],
        default: others,
    });

    b.select(when1);
    let r1 = b.const_int(2);
    b.push(Op::Return { src: Some(r1) });
    b.select(when2);
    let r2 = b.const_int(3);
    b.push(Op::Return { src: Some(r2) });
    b.select(others);
    let r3 = b.const_int(5);
    b.push(Op::Return { src: Some(r3) });
    b.finish()
}

/// `lookup(x)`: indexes a constant real table whose first entry is 0.62.
pub fn lookup_unit() -> Unit {
    let mut b = UnitBuilder::function("work.lookup", false).result(Type::Real);
    let x = b.reg();
    let table = b.var(
        "table",
        Type::Carray {
            len: 3,
            elem: Box::new(Type::Real),
        },
    );

    let e0 = b.const_real(0.62);
    let e1 = b.const_real(1.24);
    let e2 = b.const_real(4.96);
    let init = b.reg();
    b.push(Op::ConstArray {
        dest: init,
        values: vec![e0, e1, e2],
    });
    let base = b.reg();
    b.push(Op::Index {
        dest: base,
        var: VarRef {
            depth: 0,
            index: table,
        },
    });
    let three = b.const_int(3);
    b.push(Op::Copy {
        dst: base,
        src: init,
        count: three,
    });

    let addr = b.reg();
    b.push(Op::Add {
        dest: addr,
        lhs: base,
        rhs: x,
    });
    let value = b.reg();
    b.push(Op::LoadIndirect { dest: value, addr });
    b.push(Op::Return { src: Some(value) });
    b.finish()
}

/// `flip(v)`: reverses a one-dimensional vector, preserving its range.
pub fn flip_unit() -> Unit {
    let mut b = UnitBuilder::function("work.flip", false).result(Type::string());
    let v = b.reg();
    let i = b.var("i", int_ty());

    let len = b.reg();
    b.push(Op::UarrayLen {
        dest: len,
        src: v,
        dim: 0,
    });
    let src = b.reg();
    b.push(Op::Unwrap { dest: src, src: v });
    let dst = b.reg();
    b.push(Op::Alloca {
        dest: dst,
        count: len,
    });
    let zero = b.const_int(0);
    let one = b.const_int(1);
    b.push(Op::Store {
        var: VarRef { depth: 0, index: i },
        src: zero,
    });
    let test = b.block();
    let body = b.block();
    let exit = b.block();
    b.push(Op::Jump { target: test });

    b.select(test);
    let iv = b.reg();
    b.push(Op::Load {
        dest: iv,
        var: VarRef { depth: 0, index: i },
    });
    let more = b.reg();
    b.push(Op::Cmp {
        dest: more,
        op: CmpOp::Lt,
        lhs: iv,
        rhs: len,
    });
    b.push(Op::Cond {
        test: more,
        if_true: body,
        if_false: exit,
    });

    b.select(body);
    let iv2 = b.reg();
    b.push(Op::Load {
        dest: iv2,
        var: VarRef { depth: 0, index: i },
    });
    let from = b.reg();
    b.push(Op::Add {
        dest: from,
        lhs: src,
        rhs: iv2,
    });
    let element = b.reg();
    b.push(Op::LoadIndirect {
        dest: element,
        addr: from,
    });
    let tail = b.reg();
    b.push(Op::Sub {
        dest: tail,
        lhs: len,
        rhs: iv2,
    });
    let mirrored = b.reg();
    b.push(Op::Sub {
        dest: mirrored,
        lhs: tail,
        rhs: one,
    });
    let to = b.reg();
    b.push(Op::Add {
        dest: to,
        lhs: dst,
        rhs: mirrored,
    });
    b.push(Op::StoreIndirect {
        addr: to,
        src: element,
    });
    let next = b.reg();
    b.push(Op::Add {
        dest: next,
        lhs: iv2,
        rhs: one,
    });
    b.push(Op::Store {
        var: VarRef { depth: 0, index: i },
        src: next,
    });
    b.push(Op::Jump { target: test });

    b.select(exit);
    let left = b.reg();
    b.push(Op::UarrayLeft {
        dest: left,
        src: v,
        dim: 0,
    });
    let right = b.reg();
    b.push(Op::UarrayRight {
        dest: right,
        src: v,
        dim: 0,
    });
    let dir = b.reg();
    b.push(Op::UarrayDir {
        dest: dir,
        src: v,
        dim: 0,
    });
    let wrapped = b.reg();
    b.push(Op::Wrap {
        dest: wrapped,
        src: dst,
        dims: vec![WrapDim { left, right, dir }],
        span: Span::default(),
    });
    b.push(Op::Return { src: Some(wrapped) });
    b.finish()
}

/// `get_bitvec(lo, hi)`: a 2-element ascending bit vector initialised "00".
pub fn get_bitvec_unit() -> Unit {
    let mut b = UnitBuilder::function("work.get_bitvec", false).result(Type::string());
    let lo = b.reg();
    let hi = b.reg();
    let s = b.var(
        "s",
        Type::Carray {
            len: 2,
            elem: Box::new(Type::char_cell()),
        },
    );

    let z0 = b.const_int('0' as i64);
    let z1 = b.const_int('0' as i64);
    let init = b.reg();
    b.push(Op::ConstArray {
        dest: init,
        values: vec![z0, z1],
    });
    let base = b.reg();
    b.push(Op::Index {
        dest: base,
        var: VarRef { depth: 0, index: s },
    });
    let two = b.const_int(2);
    b.push(Op::Copy {
        dst: base,
        src: init,
        count: two,
    });

    let dir = b.const_int(0);
    let wrapped = b.reg();
    b.push(Op::Wrap {
        dest: wrapped,
        src: base,
        dims: vec![WrapDim {
            left: lo,
            right: hi,
            dir,
        }],
        span: Span::default(),
    });
    b.push(Op::Return { src: Some(wrapped) });
    b.finish()
}

/// A package with one variable initialised to 42, and a nested function
/// reading it through the enclosing scope.
pub fn pack_units(pack_name: &str) -> Vec<Unit> {
    let mut p = UnitBuilder::package(pack_name);
    let k = p.var("k", int_ty());
    let c = p.const_int(42);
    p.push(Op::Store {
        var: VarRef { depth: 0, index: k },
        src: c,
    });
    p.push(Op::Return { src: None });
    let pack = p.finish();

    let mut f = UnitBuilder::function(&format!("{}.get_k", pack_name), false)
        .nested_in(&pack)
        .result(int_ty());
    let r = f.reg();
    f.push(Op::Load {
        dest: r,
        var: VarRef { depth: 0, index: k },
    });
    f.push(Op::Return { src: Some(r) });

    vec![pack, f.finish()]
}
