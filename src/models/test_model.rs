//! 测试用的最小 ONNX 模型，直接按 protobuf 编码生成。
//!
//! 图结构：`data [1,3,224,224]` → GlobalAveragePool → `pool_out [1,3,1,1]`
//! → Cast(int64) → `pool_int [1,3,1,1]`。对常量输入，每个通道的输出就是该通道的值，
//! 所以可以把三个通道当作三个类别的 logit。

use bytes::Bytes;

pub const FLOAT_OUTPUT: &str = "pool_out";
pub const INT_OUTPUT: &str = "pool_int";

const FLOAT: u64 = 1;
const INT64: u64 = 7;

fn varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn field_varint(field: u64, value: u64, out: &mut Vec<u8>) {
    varint(field << 3, out);
    varint(value, out);
}

fn field_bytes(field: u64, bytes: &[u8], out: &mut Vec<u8>) {
    varint((field << 3) | 2, out);
    varint(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

fn value_info(name: &str, elem_type: u64, dims: &[u64]) -> Vec<u8> {
    let mut shape = Vec::new();
    for &d in dims {
        let mut dim = Vec::new();
        field_varint(1, d, &mut dim); // dim_value
        field_bytes(1, &dim, &mut shape);
    }

    let mut tensor_type = Vec::new();
    field_varint(1, elem_type, &mut tensor_type);
    field_bytes(2, &shape, &mut tensor_type);

    let mut type_proto = Vec::new();
    field_bytes(1, &tensor_type, &mut type_proto);

    let mut info = Vec::new();
    field_bytes(1, name.as_bytes(), &mut info);
    field_bytes(2, &type_proto, &mut info);
    info
}

fn node(op_type: &str, name: &str, input: &str, output: &str, attribute: Option<Vec<u8>>) -> Vec<u8> {
    let mut node = Vec::new();
    field_bytes(1, input.as_bytes(), &mut node);
    field_bytes(2, output.as_bytes(), &mut node);
    field_bytes(3, name.as_bytes(), &mut node);
    field_bytes(4, op_type.as_bytes(), &mut node);
    if let Some(attr) = attribute {
        field_bytes(5, &attr, &mut node);
    }
    node
}

/// 生成测试模型的字节
pub fn pooling_model() -> Bytes {
    // Cast 的 `to` 属性：name=1, i=3, type=20 (INT)
    let mut cast_to = Vec::new();
    field_bytes(1, b"to", &mut cast_to);
    field_varint(3, INT64, &mut cast_to);
    field_varint(20, 2, &mut cast_to);

    let mut graph = Vec::new();
    field_bytes(1, &node("GlobalAveragePool", "pool", "data", FLOAT_OUTPUT, None), &mut graph);
    field_bytes(1, &node("Cast", "cast", FLOAT_OUTPUT, INT_OUTPUT, Some(cast_to)), &mut graph);
    field_bytes(2, b"pooling", &mut graph);
    field_bytes(11, &value_info("data", FLOAT, &[1, 3, 224, 224]), &mut graph);
    field_bytes(12, &value_info(FLOAT_OUTPUT, FLOAT, &[1, 3, 1, 1]), &mut graph);
    field_bytes(12, &value_info(INT_OUTPUT, INT64, &[1, 3, 1, 1]), &mut graph);

    let mut opset = Vec::new();
    field_bytes(1, b"", &mut opset);
    field_varint(2, 13, &mut opset);

    let mut model = Vec::new();
    field_varint(1, 7, &mut model); // ir_version
    field_bytes(2, b"onnx-classifier-tests", &mut model);
    field_bytes(7, &graph, &mut model);
    field_bytes(8, &opset, &mut model);

    Bytes::from(model)
}
