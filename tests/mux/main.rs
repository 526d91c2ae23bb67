mod descriptor_ops;
mod namespace_ops;
