//! 文档信息字典
//!
//! 写入脱敏工具信息，可选清理原有的文档信息字段。

use lopdf::{Document, Object, StringFormat};

use crate::PdfError;

const PRODUCER_NAME: &str = "pricemask";

/// 清理结果
#[derive(Debug, Clone, Default)]
pub struct CleanResult {
    pub items_removed: usize,
    pub details: Vec<String>,
}

impl CleanResult {
    pub fn add(&mut self, detail: String) {
        self.items_removed += 1;
        self.details.push(detail);
    }
}

fn info_id(doc: &Document) -> Option<lopdf::ObjectId> {
    match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    }
}

/// 清理 Info 字典
///
/// 删除 Title, Author, Subject, Keywords, Creator, Producer, CreationDate。
/// ModDate 随后由 `set_redaction_metadata` 重写。
pub fn clean_info_dict(doc: &mut Document) -> CleanResult {
    let mut result = CleanResult::default();
    let Some(info_id) = info_id(doc) else {
        return result;
    };

    if let Ok(Object::Dictionary(ref mut info_dict)) = doc.get_object_mut(info_id) {
        let fields_to_remove = [
            b"Title".as_slice(),
            b"Author".as_slice(),
            b"Subject".as_slice(),
            b"Keywords".as_slice(),
            b"Creator".as_slice(),
            b"Producer".as_slice(),
            b"CreationDate".as_slice(),
        ];

        for field in fields_to_remove {
            if info_dict.has(field) {
                info_dict.remove(field);
                result.add(format!("已移除 Info/{}", String::from_utf8_lossy(field)));
            }
        }
    }

    log::info!("[Metadata] Info 字典清理完成: 移除 {} 项", result.items_removed);
    result
}

/// 设置脱敏工具的元数据
pub fn set_redaction_metadata(doc: &mut Document) -> Result<(), PdfError> {
    use chrono::Local;

    let info_id = match info_id(doc) {
        Some(id) => id,
        None => {
            let new_id = doc.add_object(Object::Dictionary(lopdf::Dictionary::new()));
            doc.trailer.set(b"Info", Object::Reference(new_id));
            new_id
        }
    };

    // PDF 日期格式 D:YYYYMMDDHHmmSS
    let now = Local::now();
    let pdf_date = format!("D:{}", now.format("%Y%m%d%H%M%S"));
    let producer = format!("{} v{}", PRODUCER_NAME, env!("CARGO_PKG_VERSION"));

    match doc.get_object_mut(info_id) {
        Ok(Object::Dictionary(ref mut info_dict)) => {
            info_dict.set(
                b"Producer",
                Object::String(producer.into_bytes(), StringFormat::Literal),
            );
            info_dict.set(
                b"ModDate",
                Object::String(pdf_date.into_bytes(), StringFormat::Literal),
            );
            Ok(())
        }
        _ => Err(PdfError::Parse("Info 对象不是字典".to_string())),
    }
}
