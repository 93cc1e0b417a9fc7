extern crate phf_codegen;

use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Global names the compiler is willing to turn into builtin loads. This
/// is the intersection of what the major engines expose and what the
/// downstream fuzzer knows how to seed.
const RECOGNIZED_GLOBALS: &[&str] = &[
    "Object",
    "Function",
    "Array",
    "Number",
    "Boolean",
    "String",
    "Symbol",
    "BigInt",
    "RegExp",
    "Date",
    "Promise",
    "Proxy",
    "Reflect",
    "Map",
    "Set",
    "WeakMap",
    "WeakSet",
    "WeakRef",
    "FinalizationRegistry",
    "ArrayBuffer",
    "SharedArrayBuffer",
    "DataView",
    "Int8Array",
    "Uint8Array",
    "Uint8ClampedArray",
    "Int16Array",
    "Uint16Array",
    "Int32Array",
    "Uint32Array",
    "Float32Array",
    "Float64Array",
    "BigInt64Array",
    "BigUint64Array",
    "Error",
    "AggregateError",
    "EvalError",
    "RangeError",
    "ReferenceError",
    "SyntaxError",
    "TypeError",
    "URIError",
    "Math",
    "JSON",
    "Atomics",
    "globalThis",
    "console",
    "eval",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "escape",
    "unescape",
    "encodeURI",
    "decodeURI",
    "encodeURIComponent",
    "decodeURIComponent",
    "gc",
    "print",
    "this",
];

/// Engine intrinsics reachable through the `%Name(...)` natives syntax.
/// Stored without the `%` prefix; callers strip it before the lookup.
const V8_NATIVES: &[&str] = &[
    "PrepareFunctionForOptimization",
    "OptimizeFunctionOnNextCall",
    "OptimizeOsr",
    "NeverOptimizeFunction",
    "DeoptimizeFunction",
    "DeoptimizeNow",
    "BaselineOsr",
    "CompileBaseline",
    "ClearFunctionFeedback",
    "CollectGarbage",
    "SimulateNewspaceFull",
    "DebugPrint",
    "HaveSameMap",
    "ToFastProperties",
    "VerifyType",
];

fn main() {
    let path = Path::new(&env::var("OUT_DIR").unwrap()).join("builtin_tables.rs");
    let mut file = BufWriter::new(File::create(&path).unwrap());

    write!(&mut file,
           "static RECOGNIZED_GLOBALS: phf::Set<&'static str> = ")
        .unwrap();
    let mut globals = phf_codegen::Set::new();
    for name in RECOGNIZED_GLOBALS {
        globals.entry(*name);
    }
    write!(&mut file, "{}", globals.build()).unwrap();
    write!(&mut file, ";\n").unwrap();

    write!(&mut file, "static V8_NATIVES: phf::Set<&'static str> = ").unwrap();
    let mut natives = phf_codegen::Set::new();
    for name in V8_NATIVES {
        natives.entry(*name);
    }
    write!(&mut file, "{}", natives.build()).unwrap();
    write!(&mut file, ";\n").unwrap();
}
