//! Minimal class-file reader
//!
//! Reads just enough of a compiled class to answer two questions: does it
//! declare `public static void main(String[])`, and which annotation types
//! are present on the class itself.

use thiserror::Error;

const MAGIC: u32 = 0xCAFE_BABE;
const ACC_PUBLIC: u16 = 0x0001;
const ACC_STATIC: u16 = 0x0008;
const MAIN_METHOD_NAME: &str = "main";
const MAIN_METHOD_DESCRIPTOR: &str = "([Ljava/lang/String;)V";
const VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
const INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";
/// Deepest nesting of annotation element values accepted
const MAX_ELEMENT_DEPTH: usize = 64;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClassFileError {
    #[error("not a class file")]
    BadMagic,

    #[error("class file truncated at offset {0}")]
    Truncated(usize),

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstant { tag: u8, index: u16 },

    #[error("constant at index {0} runs past the end of the constant pool")]
    PoolOverrun(u16),

    #[error("constant pool index {0} is not a UTF-8 entry")]
    NotUtf8(u16),

    #[error("unknown element value tag '{0}'")]
    UnknownElementValue(char),

    #[error("annotation values nested too deeply")]
    NestingTooDeep,
}

type ClassResult<T> = Result<T, ClassFileError>;

/// What the scanner needs to know about a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    /// Fully-qualified dotted name
    pub name: String,
    pub has_main_method: bool,
    /// Dotted type names of class-level annotations, in declaration order
    pub annotations: Vec<String>,
}

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class(u16),
    Other,
    /// Second slot of a long or double
    Unusable,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> ClassResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(ClassFileError::Truncated(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> ClassResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> ClassResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> ClassResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn skip(&mut self, len: usize) -> ClassResult<()> {
        self.take(len).map(|_| ())
    }
}

struct ConstantPool(Vec<Constant>);

impl ConstantPool {
    fn read(reader: &mut Reader<'_>) -> ClassResult<Self> {
        let count = reader.u16()?;
        let mut entries = vec![Constant::Unusable; count as usize];
        let mut index = 1u16;
        while index < count {
            let tag = reader.u8()?;
            let (constant, slots) = match tag {
                1 => {
                    let len = reader.u16()? as usize;
                    let raw = reader.take(len)?;
                    (Constant::Utf8(String::from_utf8_lossy(raw).into_owned()), 1)
                }
                7 => (Constant::Class(reader.u16()?), 1),
                3 | 4 => {
                    reader.skip(4)?;
                    (Constant::Other, 1)
                }
                5 | 6 => {
                    reader.skip(8)?;
                    (Constant::Other, 2)
                }
                8 | 16 | 19 | 20 => {
                    reader.skip(2)?;
                    (Constant::Other, 1)
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    (Constant::Other, 1)
                }
                15 => {
                    reader.skip(3)?;
                    (Constant::Other, 1)
                }
                tag => return Err(ClassFileError::UnknownConstant { tag, index }),
            };
            entries[index as usize] = constant;
            index = index
                .checked_add(slots)
                .filter(|next| *next <= count)
                .ok_or(ClassFileError::PoolOverrun(index))?;
        }
        Ok(Self(entries))
    }

    fn utf8(&self, index: u16) -> ClassResult<&str> {
        match self.0.get(index as usize) {
            Some(Constant::Utf8(value)) => Ok(value),
            _ => Err(ClassFileError::NotUtf8(index)),
        }
    }

    fn class_name(&self, index: u16) -> ClassResult<String> {
        match self.0.get(index as usize) {
            Some(Constant::Class(name_index)) => Ok(self.utf8(*name_index)?.replace('/', ".")),
            _ => Err(ClassFileError::NotUtf8(index)),
        }
    }
}

/// Parse a class file
pub fn parse(bytes: &[u8]) -> ClassResult<ClassInfo> {
    let mut reader = Reader::new(bytes);
    if reader.u32()? != MAGIC {
        return Err(ClassFileError::BadMagic);
    }
    reader.skip(4)?; // minor + major version
    let pool = ConstantPool::read(&mut reader)?;

    reader.skip(2)?; // access flags
    let name = pool.class_name(reader.u16()?)?;
    reader.skip(2)?; // super class
    let interfaces = reader.u16()? as usize;
    reader.skip(interfaces * 2)?;

    let fields = reader.u16()?;
    for _ in 0..fields {
        reader.skip(6)?;
        skip_attributes(&mut reader)?;
    }

    let mut has_main_method = false;
    let methods = reader.u16()?;
    for _ in 0..methods {
        let access = reader.u16()?;
        let method_name = pool.utf8(reader.u16()?)?;
        let descriptor = pool.utf8(reader.u16()?)?;
        if access & (ACC_PUBLIC | ACC_STATIC) == ACC_PUBLIC | ACC_STATIC
            && method_name == MAIN_METHOD_NAME
            && descriptor == MAIN_METHOD_DESCRIPTOR
        {
            has_main_method = true;
        }
        skip_attributes(&mut reader)?;
    }

    let mut annotations = Vec::new();
    let attributes = reader.u16()?;
    for _ in 0..attributes {
        let attribute_name = pool.utf8(reader.u16()?)?;
        let len = reader.u32()? as usize;
        if attribute_name == VISIBLE_ANNOTATIONS || attribute_name == INVISIBLE_ANNOTATIONS {
            let mut body = Reader::new(reader.take(len)?);
            let count = body.u16()?;
            for _ in 0..count {
                annotations.push(read_annotation(&mut body, &pool, 0)?);
            }
        } else {
            reader.skip(len)?;
        }
    }

    Ok(ClassInfo {
        name,
        has_main_method,
        annotations,
    })
}

fn skip_attributes(reader: &mut Reader<'_>) -> ClassResult<()> {
    let count = reader.u16()?;
    for _ in 0..count {
        reader.skip(2)?;
        let len = reader.u32()? as usize;
        reader.skip(len)?;
    }
    Ok(())
}

/// Read one annotation and return its dotted type name
fn read_annotation(
    reader: &mut Reader<'_>,
    pool: &ConstantPool,
    depth: usize,
) -> ClassResult<String> {
    let descriptor = pool.utf8(reader.u16()?)?;
    let pairs = reader.u16()?;
    for _ in 0..pairs {
        reader.skip(2)?;
        skip_element_value(reader, pool, depth + 1)?;
    }
    Ok(descriptor_to_name(descriptor))
}

fn skip_element_value(reader: &mut Reader<'_>, pool: &ConstantPool, depth: usize) -> ClassResult<()> {
    if depth > MAX_ELEMENT_DEPTH {
        return Err(ClassFileError::NestingTooDeep);
    }
    let tag = reader.u8()? as char;
    match tag {
        'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' | 's' | 'c' => reader.skip(2),
        'e' => reader.skip(4),
        '@' => read_annotation(reader, pool, depth).map(|_| ()),
        '[' => {
            let count = reader.u16()?;
            for _ in 0..count {
                skip_element_value(reader, pool, depth + 1)?;
            }
            Ok(())
        }
        other => Err(ClassFileError::UnknownElementValue(other)),
    }
}

/// `Lcom/acme/Service;` -> `com.acme.Service`
pub fn descriptor_to_name(descriptor: &str) -> String {
    descriptor
        .strip_prefix('L')
        .and_then(|d| d.strip_suffix(';'))
        .unwrap_or(descriptor)
        .replace('/', ".")
}

/// Test helper that assembles class files by hand
#[cfg(test)]
pub(crate) mod fixtures {
    /// Build a class with an optional `main` method and class annotations.
    ///
    /// `annotations` are internal names such as `com/acme/Service`.
    pub fn class_bytes(name: &str, with_main: bool, annotations: &[&str]) -> Vec<u8> {
        fn utf8(pool: &mut Vec<Vec<u8>>, value: &str) -> u16 {
            let mut entry = vec![1u8];
            entry.extend_from_slice(&(value.len() as u16).to_be_bytes());
            entry.extend_from_slice(value.as_bytes());
            pool.push(entry);
            pool.len() as u16
        }

        let mut pool: Vec<Vec<u8>> = Vec::new();
        let name_index = utf8(&mut pool, &name.replace('.', "/"));
        pool.push(vec![7, (name_index >> 8) as u8, name_index as u8]);
        let this_class = pool.len() as u16;
        let object_name = utf8(&mut pool, "java/lang/Object");
        pool.push(vec![7, (object_name >> 8) as u8, object_name as u8]);
        let super_class = pool.len() as u16;
        // A long constant occupies two slots
        pool.push(vec![5, 0, 0, 0, 0, 0, 0, 0, 42]);
        pool.push(Vec::new());
        let main = utf8(&mut pool, "main");
        let descriptor = utf8(&mut pool, "([Ljava/lang/String;)V");
        let annotation_attr = utf8(&mut pool, "RuntimeVisibleAnnotations");
        let value_name = utf8(&mut pool, "value");
        let value = utf8(&mut pool, "x");
        let annotation_types: Vec<u16> = annotations
            .iter()
            .map(|a| utf8(&mut pool, &format!("L{};", a)))
            .collect();

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&[0, 0, 0, 52]);
        out.extend_from_slice(&((pool.len() + 1) as u16).to_be_bytes());
        for entry in &pool {
            out.extend_from_slice(entry);
        }
        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&this_class.to_be_bytes());
        out.extend_from_slice(&super_class.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // interfaces
        out.extend_from_slice(&0u16.to_be_bytes()); // fields
        if with_main {
            out.extend_from_slice(&1u16.to_be_bytes());
            out.extend_from_slice(&0x0009u16.to_be_bytes());
            out.extend_from_slice(&main.to_be_bytes());
            out.extend_from_slice(&descriptor.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
        } else {
            out.extend_from_slice(&0u16.to_be_bytes());
        }
        if annotation_types.is_empty() {
            out.extend_from_slice(&0u16.to_be_bytes());
        } else {
            let mut body = Vec::new();
            body.extend_from_slice(&(annotation_types.len() as u16).to_be_bytes());
            for type_index in &annotation_types {
                body.extend_from_slice(&type_index.to_be_bytes());
                // one pair: value = "x"
                body.extend_from_slice(&1u16.to_be_bytes());
                body.extend_from_slice(&value_name.to_be_bytes());
                body.push(b's');
                body.extend_from_slice(&value.to_be_bytes());
            }
            out.extend_from_slice(&1u16.to_be_bytes());
            out.extend_from_slice(&annotation_attr.to_be_bytes());
            out.extend_from_slice(&(body.len() as u32).to_be_bytes());
            out.extend_from_slice(&body);
        }
        out
    }
}
