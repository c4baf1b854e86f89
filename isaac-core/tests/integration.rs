//! End-to-end coverage of the public launcher API (`Launcher`/`execute`)
//! against the `sim` driver, exercising the scheduler and dispatcher
//! together rather than either in isolation.

use isaac_core::dispatch::Dispatcher;
use isaac_core::driver::{Backend, Context, SimBackend};
use isaac_core::expression::{Node, Token, Tree};
use isaac_core::schedule::{schedule, Kind};
use isaac_core::{execute, Environment, Launcher, Optimize};
use isaac_types::{NumericType, Scalar, ScalarValue, Shape, Stride};
use std::sync::Arc;

fn dense(ctx: &Arc<dyn Context>, shape: Vec<i64>) -> Tree {
    let shape = Shape::new(shape);
    let stride = Stride::new(vec![1; shape.len()]);
    let bytes = (shape.product().max(1) as usize) * NumericType::Float32.size_of();
    let buffer = ctx.allocate(bytes).unwrap();
    Tree::leaf(Node::DenseArray { dtype: NumericType::Float32, shape, stride, start_offset: 0, buffer }, ctx.clone())
}

fn dense_with_layout(ctx: &Arc<dyn Context>, shape: Vec<i64>, stride: Vec<i64>, start_offset: i64) -> Tree {
    let shape = Shape::new(shape);
    let stride = Stride::new(stride);
    let elements = shape.product().max(1) as usize * stride.max().max(1) as usize;
    let bytes = elements * NumericType::Float32.size_of();
    let buffer = ctx.allocate(bytes).unwrap();
    Tree::leaf(Node::DenseArray { dtype: NumericType::Float32, shape, stride, start_offset, buffer }, ctx.clone())
}

fn scalar(ctx: &Arc<dyn Context>, value: f32) -> Tree {
    Tree::leaf(
        Node::ValueScalar { dtype: NumericType::Float32, value: Scalar::new(ScalarValue::Float32(value)) },
        ctx.clone(),
    )
}

fn run(tree: Tree) -> Vec<Box<dyn isaac_core::driver::Event>> {
    let (ctx, queue) = SimBackend::new_queue(Backend::OpenClLike);
    let _ = ctx;
    let dispatcher = Dispatcher::with_default_profiles();
    let launcher = Launcher { tree, environment: Environment::new(queue.as_ref()), optimize: Optimize::default() };
    execute(launcher, &dispatcher).unwrap()
}

#[test]
fn axpy_style_update_runs_as_a_single_elementwise_kernel() {
    let (ctx, queue) = SimBackend::new_queue(Backend::OpenClLike);
    let x = dense(&ctx, vec![256]);
    let y = dense(&ctx, vec![256]);
    let two = scalar(&ctx, 2.0);
    let three = scalar(&ctx, 3.0);

    let two_x = Tree::compose(&two, Token::mult(), &x, NumericType::Float32, Shape::new(vec![256])).unwrap();
    let three_y = Tree::compose(&three, Token::mult(), &y, NumericType::Float32, Shape::new(vec![256])).unwrap();
    let rhs = Tree::compose(&two_x, Token::add(), &three_y, NumericType::Float32, Shape::new(vec![256])).unwrap();
    let out = dense(&ctx, vec![256]);
    let assign = Tree::compose(&out, Token::assign(), &rhs, NumericType::Float32, Shape::new(vec![256])).unwrap();

    let plan = schedule(&assign).unwrap();
    assert!(plan.temporaries.is_empty());
    assert_eq!(plan.final_kernel.kind, Kind::ElementWise1D);

    let dispatcher = Dispatcher::with_default_profiles();
    let launcher = Launcher { tree: assign, environment: Environment::new(queue.as_ref()), optimize: Optimize::default() };
    let events = execute(launcher, &dispatcher).unwrap();
    assert!(!events.is_empty());
}

#[test]
fn dot_product_schedules_as_a_single_1d_reduction() {
    let (ctx, _queue) = SimBackend::new_queue(Backend::OpenClLike);
    let x = dense(&ctx, vec![128]);
    let y = dense(&ctx, vec![128]);
    let prod = Tree::compose(&x, Token::mult(), &y, NumericType::Float32, Shape::new(vec![128])).unwrap();
    let reduced = Tree::unary(&prod, Token::sum(None), NumericType::Float32, Shape::new(vec![1])).unwrap();
    let out = dense(&ctx, vec![1]);
    let assign = Tree::compose(&out, Token::assign(), &reduced, NumericType::Float32, Shape::new(vec![1])).unwrap();

    let plan = schedule(&assign).unwrap();
    assert!(plan.temporaries.is_empty());
    assert_eq!(plan.final_kernel.kind, Kind::Reduce1D);

    let events = run(assign);
    assert!(!events.is_empty());
}

#[test]
fn direct_matrix_product_assignment_materializes_nothing() {
    let (ctx, _queue) = SimBackend::new_queue(Backend::OpenClLike);
    let a = dense(&ctx, vec![16, 16]);
    let b = dense(&ctx, vec![16, 16]);
    let mm = Tree::compose(&a, Token::matrix_product(false, false), &b, NumericType::Float32, Shape::new(vec![16, 16]))
        .unwrap();
    let out = dense(&ctx, vec![16, 16]);
    let assign = Tree::compose(&out, Token::assign(), &mm, NumericType::Float32, Shape::new(vec![16, 16])).unwrap();

    let plan = schedule(&assign).unwrap();
    assert!(plan.temporaries.is_empty());
    assert_eq!(plan.final_kernel.kind, Kind::MatrixProductNN);

    let events = run(assign);
    assert!(!events.is_empty());
}

#[test]
fn transposed_matrix_product_resolves_trans_without_a_temporary() {
    let (ctx, _queue) = SimBackend::new_queue(Backend::OpenClLike);
    let a = dense(&ctx, vec![16, 16]);
    let b = dense(&ctx, vec![16, 16]);
    let b_t = Tree::unary(&b, Token::trans(), NumericType::Float32, Shape::new(vec![16, 16])).unwrap();
    let mm = Tree::compose(&a, Token::matrix_product(false, true), &b_t, NumericType::Float32, Shape::new(vec![16, 16]))
        .unwrap();
    let out = dense(&ctx, vec![16, 16]);
    let assign = Tree::compose(&out, Token::assign(), &mm, NumericType::Float32, Shape::new(vec![16, 16])).unwrap();

    let plan = schedule(&assign).unwrap();
    assert!(plan.temporaries.is_empty());
    assert_eq!(plan.final_kernel.kind, Kind::MatrixProductNT);

    let events = run(assign);
    assert!(!events.is_empty());
}

#[test]
fn row_reduction_of_a_matrix_schedules_as_reduce2d_rows() {
    let (ctx, _queue) = SimBackend::new_queue(Backend::OpenClLike);
    let a = dense(&ctx, vec![32, 16]);
    let reduced = Tree::unary(&a, Token::sum(Some(1)), NumericType::Float32, Shape::new(vec![32])).unwrap();
    let out = dense(&ctx, vec![32]);
    let assign = Tree::compose(&out, Token::assign(), &reduced, NumericType::Float32, Shape::new(vec![32])).unwrap();

    let plan = schedule(&assign).unwrap();
    assert!(plan.temporaries.is_empty());
    assert_eq!(plan.final_kernel.kind, Kind::Reduce2DRows);

    let events = run(assign);
    assert!(!events.is_empty());
}

#[test]
fn two_differently_offset_and_strided_views_both_dispatch_through_one_shared_cached_program() {
    let (ctx, queue) = SimBackend::new_queue(Backend::OpenClLike);
    let dispatcher = Dispatcher::with_default_profiles();

    let build = |ctx: &Arc<dyn Context>, start_offset: i64, stride0: i64| {
        let x = dense_with_layout(ctx, vec![64], vec![stride0], start_offset);
        let y = dense(ctx, vec![64]);
        let sum = Tree::compose(&x, Token::add(), &y, NumericType::Float32, Shape::new(vec![64])).unwrap();
        let out = dense(ctx, vec![64]);
        Tree::compose(&out, Token::assign(), &sum, NumericType::Float32, Shape::new(vec![64])).unwrap()
    };

    let assign1 = build(&ctx, 0, 2);
    let assign2 = build(&ctx, 11, 3);

    let launcher1 = Launcher { tree: assign1, environment: Environment::new(queue.as_ref()), optimize: Optimize::default() };
    let events1 = execute(launcher1, &dispatcher).unwrap();
    assert!(!events1.is_empty());

    let launcher2 = Launcher { tree: assign2, environment: Environment::new(queue.as_ref()), optimize: Optimize::default() };
    let events2 = execute(launcher2, &dispatcher).unwrap();
    assert!(!events2.is_empty());

    assert_eq!(queue.program_cache().len(), 1);
}

#[test]
fn elementwise_plus_reduction_materializes_exactly_one_temporary() {
    let (ctx, _queue) = SimBackend::new_queue(Backend::OpenClLike);
    let x = dense(&ctx, vec![64]);
    let y = dense(&ctx, vec![64]);
    let reduced = Tree::unary(&y, Token::sum(None), NumericType::Float32, Shape::new(vec![1])).unwrap();
    let rhs = Tree::compose(&x, Token::add(), &reduced, NumericType::Float32, Shape::new(vec![64])).unwrap();
    let out = dense(&ctx, vec![64]);
    let assign = Tree::compose(&out, Token::assign(), &rhs, NumericType::Float32, Shape::new(vec![64])).unwrap();

    let plan = schedule(&assign).unwrap();
    assert_eq!(plan.temporaries.len(), 1);
    assert_eq!(plan.temporaries[0].kind, Kind::Reduce1D);
    assert_eq!(plan.final_kernel.kind, Kind::ElementWise1D);

    let events = run(assign);
    assert!(!events.is_empty());
}
