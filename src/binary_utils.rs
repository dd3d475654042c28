use anyhow::{Result, bail};

/// Read a big-endian 16-bit or 32-bit value from `data` at `index`.
pub fn get_value_be(data: &[u8], index: usize, length: usize) -> Result<u32> {
    if index > data.len() || length > data.len() - index {
        bail!("get_value_be: index out of bounds");
    }

    match length {
        2 => {
            let bytes: [u8; 2] = data[index..index + 2].try_into().unwrap();
            Ok(u32::from(u16::from_be_bytes(bytes)))
        }
        4 => {
            let bytes: [u8; 4] = data[index..index + 4].try_into().unwrap();
            Ok(u32::from_be_bytes(bytes))
        }
        _ => bail!("get_value_be: unsupported length {}", length),
    }
}

/// Write a big-endian 16-bit or 32-bit value into `data` at `index`.
pub fn update_value_be(data: &mut [u8], index: usize, value: u32, length: usize) -> Result<()> {
    if index > data.len() || length > data.len() - index {
        bail!("update_value_be: index out of bounds");
    }

    match length {
        2 => {
            let val = value as u16;
            data[index..index + 2].copy_from_slice(&val.to_be_bytes());
        }
        4 => {
            data[index..index + 4].copy_from_slice(&value.to_be_bytes());
        }
        _ => bail!("update_value_be: unsupported length {}", length),
    }
    Ok(())
}
