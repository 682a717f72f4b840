//! PyTorch checkpoint reading
//!
//! candle reads `torch.save(state_dict)` archives directly. Archives written
//! with `torch.save(tensor)` carry a bare tensor at the pickle root, which
//! candle skips, so those are rebuilt here from the pickle and the zip
//! storage entries.

use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    path::{Path, PathBuf},
};

use candle_core::{
    pickle::{Object, Stack, TensorInfo},
    Device, Tensor,
};
use zip::ZipArchive;

use crate::error::{AppError, AppResult};

/// Tensors found in a PyTorch archive
#[derive(Debug)]
pub enum PthContents {
    /// `torch.save({...})`, one entry per dict key
    Named(Vec<(String, Tensor)>),
    /// `torch.save(tensor)`
    Bare(Tensor),
}

/// Reads every tensor from a `.pt`/`.pth` archive
pub fn read_pth(path: &Path) -> AppResult<PthContents> {
    let named = candle_core::pickle::read_all(path)?;
    if !named.is_empty() {
        return Ok(PthContents::Named(named));
    }

    tracing::debug!(path = %path.display(), "No state-dict entries, reading bare tensor");
    read_bare_tensor(path).map(PthContents::Bare)
}

fn archive_error(e: zip::result::ZipError) -> AppError {
    AppError::Catalog(format!("Invalid PyTorch archive: {}", e))
}

/// Rebuilds the tensor stored at the pickle root of a `torch.save(tensor)` archive
pub fn read_bare_tensor(path: &Path) -> AppResult<Tensor> {
    let mut zip = ZipArchive::new(BufReader::new(File::open(path)?)).map_err(archive_error)?;

    let pickle_name = zip
        .file_names()
        .find(|name| name.ends_with("data.pkl"))
        .map(str::to_string)
        .ok_or_else(|| AppError::Catalog(format!("No data.pkl in {}", path.display())))?;
    let dir_name = PathBuf::from(pickle_name.trim_end_matches(".pkl"));

    let root = {
        let mut reader = BufReader::new(zip.by_name(&pickle_name).map_err(archive_error)?);
        let mut stack = Stack::empty();
        stack.read_loop(&mut reader)?;
        stack.finalize()?
    };

    let info = root
        .into_tensor_info(Object::Unicode("tensor".to_string()), &dir_name)?
        .ok_or_else(|| {
            AppError::Catalog(format!(
                "{} holds neither a state-dict nor a tensor",
                path.display()
            ))
        })?;

    read_storage(&mut zip, &info)
}

fn read_storage<R: Read + Seek>(zip: &mut ZipArchive<R>, info: &TensorInfo) -> AppResult<Tensor> {
    let layout = &info.layout;
    if !layout.is_contiguous() {
        return Err(AppError::Catalog(format!(
            "Tensor in {} is not contiguous; save it with .contiguous()",
            info.path
        )));
    }

    let elem_size = info.dtype.size_in_bytes();
    let start = layout.start_offset() * elem_size;
    let end = start + layout.shape().elem_count() * elem_size;

    let mut bytes = Vec::new();
    zip.by_name(&info.path)
        .map_err(archive_error)?
        .read_to_end(&mut bytes)?;
    let data = bytes.get(start..end).ok_or_else(|| {
        AppError::Catalog(format!(
            "Storage {} holds {} bytes, tensor needs {}",
            info.path,
            bytes.len(),
            end
        ))
    })?;

    Ok(Tensor::from_raw_buffer(
        data,
        info.dtype,
        layout.shape().dims(),
        &Device::Cpu,
    )?)
}
