use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::PdfError;

/// 页面边界框（PDF 用户空间）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PageBox {
    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }
}

/// 解引用：如果是间接引用则取出目标对象
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

pub fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// 从 Object 获取数值
pub fn get_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// 从数组对象中提取边界框坐标
fn extract_box_values(arr: &[Object]) -> Option<PageBox> {
    let values: Vec<f64> = arr.iter().filter_map(get_number).collect();
    if values.len() == 4 {
        Some(PageBox {
            llx: values[0].min(values[2]),
            lly: values[1].min(values[3]),
            urx: values[0].max(values[2]),
            ury: values[1].max(values[3]),
        })
    } else {
        None
    }
}

/// 查找页面属性，沿 Parent 链向上继承
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_object(page_id).ok().and_then(|o| o.as_dict().ok());
    // Parent 链深度上限，防止循环引用
    for _ in 0..32 {
        let dict = current?;
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        current = dict.get(b"Parent").ok().and_then(|p| resolve_dict(doc, p));
    }
    None
}

/// 获取页面的 MediaBox（含继承），缺失时使用 A4
pub fn get_media_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let media_box = match inherited(doc, page_id, b"MediaBox") {
        Some(Object::Array(arr)) => extract_box_values(arr),
        _ => None,
    };

    media_box.unwrap_or_else(|| {
        log::warn!("[MediaBox] 页面缺少 MediaBox，使用默认 A4 尺寸");
        PageBox {
            llx: 0.0,
            lly: 0.0,
            urx: 595.0,
            ury: 842.0,
        }
    })
}

/// 获取页面的旋转角度
pub fn get_page_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    match inherited(doc, page_id, b"Rotate") {
        Some(Object::Integer(rotate)) => *rotate,
        _ => 0,
    }
}

/// 获取流内容（支持压缩和未压缩的流）
pub fn get_stream_content(stream: &Stream) -> Vec<u8> {
    match stream.decompressed_content() {
        Ok(data) => data,
        Err(_) => stream.content.clone(),
    }
}

/// 获取页面的内容流数据，多个流按顺序拼接
pub fn get_page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>, PdfError> {
    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| PdfError::Parse(format!("页面对象 {:?}: {}", page_id, e)))?;

    let contents = match page.get(b"Contents") {
        Ok(contents) => contents,
        // 没有内容流的空白页
        Err(_) => return Ok(Vec::new()),
    };

    match resolve(doc, contents) {
        Some(Object::Stream(stream)) => Ok(get_stream_content(stream)),
        Some(Object::Array(arr)) => {
            let mut all_content = Vec::new();
            for item in arr {
                if let Some(Object::Stream(stream)) = resolve(doc, item) {
                    all_content.extend(get_stream_content(stream));
                    all_content.push(b'\n');
                }
            }
            Ok(all_content)
        }
        _ => Ok(Vec::new()),
    }
}

/// 获取页面 Resources 中的 Font 字典
pub fn get_page_fonts<'a>(doc: &'a Document, page_id: ObjectId) -> Option<&'a Dictionary> {
    let resources = match inherited(doc, page_id, b"Resources")? {
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    resources
        .get(b"Font")
        .ok()
        .and_then(|fonts| resolve_dict(doc, fonts))
}

/// 用新的单一内容流替换页面内容
pub fn replace_page_content(doc: &mut Document, page_id: ObjectId, data: Vec<u8>) -> Result<(), PdfError> {
    let stream = Stream::new(Dictionary::new(), data);
    let stream_id = doc.add_object(stream);
    match doc.get_object_mut(page_id) {
        Ok(Object::Dictionary(ref mut dict)) => {
            dict.set(b"Contents", Object::Reference(stream_id));
            Ok(())
        }
        _ => Err(PdfError::Parse(format!("页面对象 {:?} 不是字典", page_id))),
    }
}
