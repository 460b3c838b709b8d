mod mock;
mod test_call_order;
