//! Пропуск данных модулей (опкод 0xF7).
//!
//! Данные модуля записаны самоописывающим потоком: опкод-длина, затем
//! значение указанного вида, и так до опкода EOF. Содержимое не
//! интерпретируется.

use byteorder::BigEndian;
use zrdb_error::RdbError;

use super::{
    length::read_length,
    tags::{
        MODULE_OPCODE_DOUBLE, MODULE_OPCODE_EOF, MODULE_OPCODE_FLOAT, MODULE_OPCODE_SINT,
        MODULE_OPCODE_STRING, MODULE_OPCODE_UINT,
    },
    ByteSource, DecodeResult,
};

const MODULE_NAME_CHARSET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Заголовок записи module-aux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleAuxHeader {
    pub module_id: u64,
    /// Момент загрузки (до или после ключей).
    pub when: u64,
}

/// Имя типа модуля из 64-битного идентификатора: 9 символов по 6 бит и
/// 10 бит версии кодировки в младших разрядах.
pub fn module_type_name(module_id: u64) -> String {
    let mut id = module_id >> 10;
    let mut name = [0u8; 9];
    for slot in name.iter_mut().rev() {
        *slot = MODULE_NAME_CHARSET[(id & 63) as usize];
        id >>= 6;
    }
    String::from_utf8_lossy(&name).into_owned()
}

/// Читает module-aux и пропускает его данные.
pub fn skip_module_aux<S: ByteSource>(src: &mut S) -> DecodeResult<ModuleAuxHeader> {
    let module_id = read_length(src)?;
    let when_offset = src.offset();
    let when_opcode = read_length(src)?;
    if when_opcode != MODULE_OPCODE_UINT {
        return Err(RdbError::BadEncoding {
            structure: "module aux".to_string(),
            reason: format!("'when' must be an unsigned integer, got opcode {when_opcode}"),
            offset: Some(when_offset),
            key: None,
        });
    }
    let when = read_length(src)?;
    skip_module_value(src)?;
    Ok(ModuleAuxHeader { module_id, when })
}

/// Пропускает самоописывающий поток значения модуля до EOF. Возвращает число
/// пропущенных полей.
pub fn skip_module_value<S: ByteSource>(src: &mut S) -> DecodeResult<u64> {
    let mut fields = 0;
    loop {
        let offset = src.offset();
        match read_length(src)? {
            MODULE_OPCODE_EOF => return Ok(fields),
            MODULE_OPCODE_SINT | MODULE_OPCODE_UINT => {
                read_length(src)?;
            }
            MODULE_OPCODE_FLOAT => {
                src.read_f32::<BigEndian>("skipping module float")?;
            }
            MODULE_OPCODE_DOUBLE => {
                src.read_f64::<BigEndian>("skipping module double")?;
            }
            MODULE_OPCODE_STRING => {
                super::string::read_string(src)?;
            }
            other => {
                return Err(RdbError::BadEncoding {
                    structure: "module value".to_string(),
                    reason: format!("unknown module opcode {other}"),
                    offset: Some(offset),
                    key: None,
                });
            }
        }
        fields += 1;
    }
}
