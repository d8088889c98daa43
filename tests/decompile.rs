//! End-to-end decompilation over synthesized class images equivalent to
//! `javac -g` output at class file version 52.

mod common;

use common::{hi, lo, ClassImage, MethodBody, ACC_PUBLIC, ACC_STATIC};
use decomp_rs::{decompile_bytes, DecompileCause, Options, Severity};

fn decompile(image: &ClassImage) -> decomp_rs::Document {
    decompile_bytes(&image.build(), &Options::default()).expect("decompilation succeeds")
}

fn assert_no_errors(document: &decomp_rs::Document) {
    assert!(
        document
            .diagnostics
            .iter()
            .all(|d| d.severity != Severity::Error),
        "unexpected error diagnostics: {:?}",
        document.diagnostics
    );
}

/// `class A { int add(int a, int b) { return a + b; } }`
#[test]
fn add_uses_recovered_parameter_names() {
    let mut image = ClassImage::new("A", "java/lang/Object");
    image.method(
        ACC_PUBLIC,
        "add",
        "(II)I",
        MethodBody {
            max_stack: 2,
            max_locals: 3,
            // iload_1, iload_2, iadd, ireturn
            code: vec![0x1B, 0x1C, 0x60, 0xAC],
            locals: vec![
                (0, 4, "this", "LA;", 0),
                (0, 4, "a", "I", 1),
                (0, 4, "b", "I", 2),
            ],
            ..MethodBody::default()
        },
    );
    let document = decompile(&image);
    assert_no_errors(&document);
    assert!(document.source_text.contains("int add(int a, int b) {"));
    assert!(document.source_text.contains("return a + b;"));
}

#[test]
fn add_without_debug_info_numbers_its_slots() {
    let mut image = ClassImage::new("A", "java/lang/Object");
    image.method(
        ACC_PUBLIC,
        "add",
        "(II)I",
        MethodBody {
            max_stack: 2,
            max_locals: 3,
            code: vec![0x1B, 0x1C, 0x60, 0xAC],
            ..MethodBody::default()
        },
    );
    let document = decompile(&image);
    assert!(document.source_text.contains("int add(int var1, int var2) {"));
    assert!(document.source_text.contains("return var1 + var2;"));
}

/// `class B { int max(int a, int b) { if (a > b) return a; else return b; } }`
#[test]
fn max_recovers_an_if_with_two_return_arms() {
    let mut image = ClassImage::new("B", "java/lang/Object");
    image.method(
        ACC_PUBLIC,
        "max",
        "(II)I",
        MethodBody {
            max_stack: 2,
            max_locals: 3,
            // 0: iload_1  1: iload_2  2: if_icmple -> 7
            // 5: iload_1  6: ireturn  7: iload_2  8: ireturn
            code: vec![0x1B, 0x1C, 0xA4, 0x00, 0x05, 0x1B, 0xAC, 0x1C, 0xAC],
            locals: vec![
                (0, 9, "this", "LB;", 0),
                (0, 9, "a", "I", 1),
                (0, 9, "b", "I", 2),
            ],
            ..MethodBody::default()
        },
    );
    let document = decompile(&image);
    assert_no_errors(&document);
    assert!(document.source_text.contains("if (a > b) {"));
    assert!(document.source_text.contains("return a;"));
    assert!(document.source_text.contains("return b;"));
    // Both returns are inside the if; nothing trails it.
    assert_eq!(document.source_text.matches("return").count(), 2);
}

/// `class C { int fact(int n) { int r = 1; for (int i = 1; i <= n; i++) r *= i; return r; } }`
#[test]
fn fact_recovers_a_for_loop() {
    let mut image = ClassImage::new("C", "java/lang/Object");
    image.method(
        ACC_PUBLIC,
        "fact",
        "(I)I",
        MethodBody {
            max_stack: 2,
            max_locals: 4,
            // 0: iconst_1  1: istore_2  2: iconst_1  3: istore_3
            // 4: iload_3  5: iload_1  6: if_icmpgt -> 19
            // 9: iload_2  10: iload_3  11: imul  12: istore_2
            // 13: iinc 3 1  16: goto -> 4  19: iload_2  20: ireturn
            code: vec![
                0x04, 0x3D, 0x04, 0x3E, 0x1D, 0x1B, 0xA3, 0x00, 0x0D, 0x1C, 0x1D, 0x68, 0x3D,
                0x84, 0x03, 0x01, 0xA7, 0xFF, 0xF4, 0x1C, 0xAC,
            ],
            locals: vec![
                (0, 21, "this", "LC;", 0),
                (0, 21, "n", "I", 1),
                (2, 19, "r", "I", 2),
                (4, 15, "i", "I", 3),
            ],
            ..MethodBody::default()
        },
    );
    let document = decompile(&image);
    assert_no_errors(&document);
    assert!(
        document.source_text.contains("for (int i = 1; i <= n; i++) {"),
        "expected a for loop in:\n{}",
        document.source_text
    );
    assert!(document.source_text.contains("r *= i;"));
    assert!(document.source_text.contains("return r;"));
    assert!(!document.source_text.contains("while"));
}

/// `class D { void m() { try { risky(); } catch (RuntimeException e)
/// { e.printStackTrace(); } finally { cleanup(); } } }`
#[test]
fn try_catch_finally_is_reassembled() {
    let mut image = ClassImage::new("D", "java/lang/Object");
    let risky = image.method_ref("D", "risky", "()V");
    let cleanup = image.method_ref("D", "cleanup", "()V");
    let print = image.method_ref("java/lang/RuntimeException", "printStackTrace", "()V");
    let runtime_exception = image.class("java/lang/RuntimeException");
    image.method(
        ACC_PUBLIC,
        "m",
        "()V",
        MethodBody {
            max_stack: 1,
            max_locals: 3,
            // 0: aload_0  1: invokevirtual risky  4: aload_0
            // 5: invokevirtual cleanup  8: goto -> 30
            // 11: astore_1  12: aload_1  13: invokevirtual printStackTrace
            // 16: aload_0  17: invokevirtual cleanup  20: goto -> 30
            // 23: astore_2  24: aload_0  25: invokevirtual cleanup
            // 28: aload_2  29: athrow  30: return
            code: vec![
                0x2A, 0xB6, hi(risky), lo(risky),
                0x2A, 0xB6, hi(cleanup), lo(cleanup),
                0xA7, 0x00, 0x16,
                0x4C, 0x2B, 0xB6, hi(print), lo(print),
                0x2A, 0xB6, hi(cleanup), lo(cleanup),
                0xA7, 0x00, 0x0A,
                0x4D, 0x2A, 0xB6, hi(cleanup), lo(cleanup),
                0x2C, 0xBF,
                0xB1,
            ],
            exceptions: vec![
                (0, 4, 11, runtime_exception),
                (0, 4, 23, 0),
                (11, 16, 23, 0),
            ],
            locals: vec![(12, 4, "e", "Ljava/lang/RuntimeException;", 1)],
            ..MethodBody::default()
        },
    );
    let document = decompile(&image);
    assert_no_errors(&document);
    let text = &document.source_text;
    assert!(text.contains("try {"), "missing try in:\n{text}");
    assert!(text.contains("risky();"));
    assert!(text.contains("} catch (RuntimeException e) {"));
    assert!(text.contains("e.printStackTrace();"));
    assert!(text.contains("} finally {"));
    assert!(text.contains("cleanup();"));
    // The inlined finally copies are deduplicated: cleanup appears once.
    assert_eq!(text.matches("cleanup();").count(), 1);
}

/// `class E { int sw(int x) { switch (x) { case 1: return 10;
/// case 2: return 20; default: return 0; } } }`
#[test]
fn tableswitch_recovers_cases_and_default() {
    let mut image = ClassImage::new("E", "java/lang/Object");
    // 0: iload_1  1: tableswitch low=1 high=2
    //   case 1 -> 24, case 2 -> 27, default -> 30
    // 24: bipush 10  26: ireturn  27: bipush 20  29: ireturn
    // 30: iconst_0  31: ireturn
    let mut code = vec![0x1B, 0xAA, 0x00, 0x00];
    code.extend_from_slice(&29i32.to_be_bytes());
    code.extend_from_slice(&1i32.to_be_bytes());
    code.extend_from_slice(&2i32.to_be_bytes());
    code.extend_from_slice(&23i32.to_be_bytes());
    code.extend_from_slice(&26i32.to_be_bytes());
    code.extend_from_slice(&[0x10, 0x0A, 0xAC, 0x10, 0x14, 0xAC, 0x03, 0xAC]);
    image.method(
        ACC_PUBLIC,
        "sw",
        "(I)I",
        MethodBody {
            max_stack: 1,
            max_locals: 2,
            code,
            locals: vec![(0, 32, "this", "LE;", 0), (0, 32, "x", "I", 1)],
            ..MethodBody::default()
        },
    );
    let document = decompile(&image);
    assert_no_errors(&document);
    let text = &document.source_text;
    assert!(text.contains("switch (x) {"));
    assert!(text.contains("case 1:"));
    assert!(text.contains("return 10;"));
    assert!(text.contains("case 2:"));
    assert!(text.contains("return 20;"));
    assert!(text.contains("default:"));
    assert!(text.contains("return 0;"));
}

/// `class F { static String hello() { return "Hello, World!"; } }`
#[test]
fn string_constants_survive_exactly_once() {
    let mut image = ClassImage::new("F", "java/lang/Object");
    let hello = image.string("Hello, World!");
    assert!(hello <= 0xFF, "ldc needs a one-byte pool index");
    image.method(
        ACC_PUBLIC | ACC_STATIC,
        "hello",
        "()Ljava/lang/String;",
        MethodBody {
            max_stack: 1,
            max_locals: 0,
            code: vec![0x12, lo(hello), 0xB0],
            ..MethodBody::default()
        },
    );
    let document = decompile(&image);
    assert_no_errors(&document);
    assert!(document.source_text.contains("static String hello() {"));
    assert_eq!(
        document.source_text.matches("\"Hello, World!\"").count(),
        1
    );
}

#[test]
fn empty_void_method_emits_an_empty_body() {
    let mut image = ClassImage::new("A", "java/lang/Object");
    image.method(
        ACC_PUBLIC,
        "m",
        "()V",
        MethodBody {
            max_stack: 0,
            max_locals: 1,
            code: vec![0xB1],
            ..MethodBody::default()
        },
    );
    let document = decompile(&image);
    assert_no_errors(&document);
    assert!(document.source_text.contains("void m() {\n    }"));
    assert!(!document.source_text.contains("return"));
}

#[test]
fn lone_athrow_emits_a_throw_and_nothing_after() {
    let mut image = ClassImage::new("A", "java/lang/Object");
    let init = image.method_ref("java/lang/RuntimeException", "<init>", "()V");
    let runtime_exception = image.class("java/lang/RuntimeException");
    image.method(
        ACC_PUBLIC,
        "boom",
        "()V",
        MethodBody {
            max_stack: 2,
            max_locals: 1,
            // new, dup, invokespecial <init>, athrow
            code: vec![
                0xBB,
                hi(runtime_exception),
                lo(runtime_exception),
                0x59,
                0xB7,
                hi(init),
                lo(init),
                0xBF,
            ],
            ..MethodBody::default()
        },
    );
    let document = decompile(&image);
    assert_no_errors(&document);
    assert!(document
        .source_text
        .contains("throw new RuntimeException();"));
    assert!(!document.source_text.contains("return"));
}

#[test]
fn wide_iinc_updates_a_high_slot() {
    let mut image = ClassImage::new("A", "java/lang/Object");
    image.method(
        ACC_PUBLIC,
        "w",
        "()V",
        MethodBody {
            max_stack: 0,
            max_locals: 302,
            // wide iinc 300, 1000; return
            code: vec![0xC4, 0x84, 0x01, 0x2C, 0x03, 0xE8, 0xB1],
            ..MethodBody::default()
        },
    );
    let document = decompile(&image);
    assert_no_errors(&document);
    assert!(document.source_text.contains("var300 += 1000;"));
}

#[test]
fn long_parameters_reserve_two_slots() {
    let mut image = ClassImage::new("A", "java/lang/Object");
    image.method(
        ACC_PUBLIC,
        "add2",
        "(JJ)J",
        MethodBody {
            max_stack: 4,
            max_locals: 5,
            // lload_1, lload_3, ladd, lreturn
            code: vec![0x1F, 0x21, 0x61, 0xAD],
            locals: vec![
                (0, 4, "this", "LA;", 0),
                (0, 4, "a", "J", 1),
                (0, 4, "b", "J", 3),
            ],
            ..MethodBody::default()
        },
    );
    let document = decompile(&image);
    assert_no_errors(&document);
    assert!(document.source_text.contains("long add2(long a, long b) {"));
    assert!(document.source_text.contains("return a + b;"));
}

#[test]
fn exception_range_covering_the_whole_method_still_structures() {
    let mut image = ClassImage::new("A", "java/lang/Object");
    let risky = image.method_ref("A", "risky", "()V");
    let exception = image.class("java/lang/Exception");
    image.method(
        ACC_PUBLIC,
        "g",
        "()V",
        MethodBody {
            max_stack: 1,
            max_locals: 2,
            // 0: aload_0  1: invokevirtual risky  4: return
            // 5: astore_1  6: return
            code: vec![0x2A, 0xB6, hi(risky), lo(risky), 0xB1, 0x4C, 0xB1],
            exceptions: vec![(0, 7, 5, exception)],
            ..MethodBody::default()
        },
    );
    let document = decompile(&image);
    let text = &document.source_text;
    assert!(text.contains("try {"), "missing try in:\n{text}");
    assert!(text.contains("risky();"));
    assert!(text.contains("catch (Exception"));
}

#[test]
fn oversized_inputs_are_rejected() {
    let image = ClassImage::new("A", "java/lang/Object");
    let options = Options {
        max_bytes: 8,
        ..Options::default()
    };
    let err = decompile_bytes(&image.build(), &options).unwrap_err();
    assert!(matches!(err.cause, DecompileCause::FileTooLarge { .. }));
}

#[test]
fn class_level_failures_are_typed() {
    let err = decompile_bytes(&[0xDE, 0xAD, 0xBE, 0xEF], &Options::default()).unwrap_err();
    assert!(matches!(err.cause, DecompileCause::Format(_)));
}

#[test]
fn stats_count_methods_and_instructions() {
    let mut image = ClassImage::new("A", "java/lang/Object");
    image.method(
        ACC_PUBLIC,
        "m",
        "()V",
        MethodBody {
            max_stack: 0,
            max_locals: 1,
            code: vec![0xB1],
            ..MethodBody::default()
        },
    );
    image.method(
        ACC_PUBLIC,
        "id",
        "(I)I",
        MethodBody {
            max_stack: 1,
            max_locals: 2,
            code: vec![0x1B, 0xAC],
            ..MethodBody::default()
        },
    );
    let document = decompile(&image);
    assert_eq!(document.stats.methods, 2);
    assert_eq!(document.stats.instructions, 3);
}

#[test]
fn undecodable_methods_are_stubbed_and_the_class_survives() {
    let mut image = ClassImage::new("A", "java/lang/Object");
    image.method(
        ACC_PUBLIC,
        "bad",
        "()V",
        MethodBody {
            max_stack: 0,
            max_locals: 1,
            // 0xFE is not a JVM opcode.
            code: vec![0xFE, 0xB1],
            ..MethodBody::default()
        },
    );
    image.method(
        ACC_PUBLIC,
        "good",
        "()V",
        MethodBody {
            max_stack: 0,
            max_locals: 1,
            code: vec![0xB1],
            ..MethodBody::default()
        },
    );
    let document = decompile(&image);
    assert!(document
        .source_text
        .contains("// method bad could not be decompiled"));
    assert!(document.source_text.contains("void good() {"));
    assert!(document
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error));
}
