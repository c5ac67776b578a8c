/// Flat container the assembler CLI writes and the VM CLI loads: a small
/// header followed by text+data. Real object containers (ELF/PE) are a
/// separate collaborator; this is only the toolchain's own exchange format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// 32 or 64.
    pub addr_bits: u8,
    pub entry_point: usize,
    pub payload: Vec<u8>,
}

const MAGIC: &[u8; 4] = b"MXBC";
const HEADER_LEN: usize = 4 + 1 + 8;

impl Image {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(MAGIC);
        out.push(self.addr_bits);
        out.extend_from_slice(&(self.entry_point as u64).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Image, String> {
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            return Err("Not an MX bytecode image".to_string());
        }
        let addr_bits = bytes[4];
        if addr_bits != 32 && addr_bits != 64 {
            return Err(format!("Unsupported address width: {}", addr_bits));
        }
        let mut entry = [0u8; 8];
        entry.copy_from_slice(&bytes[5..13]);
        Ok(Image {
            addr_bits,
            entry_point: u64::from_le_bytes(entry) as usize,
            payload: bytes[HEADER_LEN..].to_vec(),
        })
    }
}

#[test]
fn test() {
    let img = Image {
        addr_bits: 32,
        entry_point: 7,
        payload: vec![1, 2, 3],
    };
    assert_eq!(Image::from_bytes(&img.to_bytes()), Ok(img));
    assert!(Image::from_bytes(b"ELF").is_err());
}
