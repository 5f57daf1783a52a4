//! CP/M 8.3 文件名到宿主机文件名的转换

use super::fcb::Fcb;

/// CP/M 文件名字节的高位是属性位 (只读、系统等)
const ATTRIBUTE_MASK: u8 = 0x7F;

/// 取字段中第一个空格之前的字节
fn field_prefix(field: &[u8]) -> impl Iterator<Item = u8> + '_ {
    field
        .iter()
        .map(|b| b & ATTRIBUTE_MASK)
        .take_while(|&b| b != b' ')
}

/// 拼出 `NAME.EXT` 形式的文件名
///
/// 每个字段在第一个空格处截断；扩展名为空时不加分隔符。驱动器字段被忽略
pub fn extract(fcb: &Fcb) -> String {
    let mut name: String = field_prefix(&fcb.filename).map(char::from).collect();
    let mut extension = field_prefix(&fcb.extension).peekable();
    if extension.peek().is_some() {
        name.push('.');
        name.extend(extension.map(char::from));
    }
    name
}

/// 可以交给宿主机的文件名
///
/// 空文件名、控制字符、路径分隔符以及 CP/M 通配符都会被拒绝
pub fn host_file_name(fcb: &Fcb) -> Option<String> {
    let name = extract(fcb);
    let acceptable = |c: char| c.is_ascii_graphic() && !matches!(c, '/' | '\\' | '?' | '*' | ':');
    if name.is_empty() || name.starts_with('.') || !name.chars().all(acceptable) {
        return None;
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fcb(filename: &[u8; 8], extension: &[u8; 3]) -> Fcb {
        Fcb {
            filename: *filename,
            extension: *extension,
            ..Default::default()
        }
    }

    #[test]
    fn test_name_with_extension() {
        assert_eq!(extract(&fcb(b"FOO     ", b"BAR")), "FOO.BAR");
    }

    #[test]
    fn test_name_without_extension() {
        assert_eq!(extract(&fcb(b"README  ", b"   ")), "README");
    }

    #[test]
    fn test_stops_at_first_space() {
        assert_eq!(extract(&fcb(b"A B     ", b"   ")), "A");
        assert_eq!(extract(&fcb(b"DATA    ", b"C D")), "DATA.C");
    }

    #[test]
    fn test_full_width_fields() {
        assert_eq!(extract(&fcb(b"ABCDEFGH", b"XYZ")), "ABCDEFGH.XYZ");
    }

    #[test]
    fn test_attribute_bits_stripped() {
        // 扩展名前两个字节的高位是只读/系统属性
        assert_eq!(extract(&fcb(b"FILE    ", &[b'C' | 0x80, b'O' | 0x80, b'M'])), "FILE.COM");
    }

    #[test]
    fn test_drive_ignored() {
        let mut f = fcb(b"FOO     ", b"BAR");
        f.drive = 2;
        assert_eq!(host_file_name(&f).as_deref(), Some("FOO.BAR"));
    }

    #[test]
    fn test_rejected_names() {
        assert_eq!(host_file_name(&fcb(b"        ", b"TXT")), None);
        assert_eq!(host_file_name(&fcb(b"????????", b"???")), None);
        assert_eq!(host_file_name(&fcb(b"../ETC  ", b"   ")), None);
        assert_eq!(host_file_name(&fcb(&[0; 8], b"   ")), None);
    }
}
